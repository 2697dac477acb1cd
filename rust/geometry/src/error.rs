// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for constructor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building geometry.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested shape is degenerate or inconsistent.
    #[error("invalid construction parameters: {0}")]
    InvalidParams(String),

    /// A model operation failed; the partial construction was rolled back.
    #[error("model error: {0}")]
    Core(#[from] iges_lite_core::Error),
}
