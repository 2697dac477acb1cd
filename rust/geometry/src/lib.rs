// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IGES-Lite Geometry
//!
//! High-level constructors that build whole sub-graphs of IGES entities
//! atomically: either every entity of the construction lands in the model,
//! or none does.
//!
//! The exemplar is [`CylinderBuilder`], which assembles the roughly thirty
//! inter-related entities of a vertical cylindrical trimmed surface.

pub mod cylinder;
pub mod error;

pub use cylinder::CylinderBuilder;
pub use error::{Error, Result};
