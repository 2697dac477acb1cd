// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for IGES parsing, graph assembly, and emission.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, editing, or writing an IGES model.
#[derive(Debug, Error)]
pub enum Error {
    /// Lexical or column-layout defect in an 80-column record.
    #[error("bad record at line {line}: {reason}")]
    BadRecord { line: usize, reason: String },

    /// A parameter-data token has the wrong type or is out of range.
    #[error("bad field {field}: {reason}")]
    BadField { field: &'static str, reason: String },

    /// Structural defect: missing terminate, inconsistent section counts,
    /// bogus form number.
    #[error("corrupt file: {0}")]
    CorruptFile(String),

    /// A DE pointer names a sequence number with no entity behind it.
    #[error("unresolved reference to DE {de}")]
    UnresolvedRef { de: i32 },

    /// A kind-specific rule was violated (e.g. composite-curve sequencing).
    #[error("invariant violation in entity type {entity_type}: {reason}")]
    InvariantViolation { entity_type: i32, reason: String },

    /// `add_reference` refused the parent (e.g. a 102 inside a 102).
    #[error("invalid parent: entity type {parent_type} may not reference type {child_type}")]
    InvalidParent { parent_type: i32, child_type: i32 },

    /// The named back-edge or entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An accessor that requires resolved children was called before
    /// association.
    #[error("entity type {0} is not associated yet")]
    NotAssociated(i32),

    /// The NURBS kernel reported a failure.
    #[error("NURBS kernel failure: {0}")]
    ExternalFailure(String),

    /// An entity kind or form number this implementation does not support.
    #[error("unimplemented entity type {entity_type} form {form}")]
    Unimplemented { entity_type: i32, form: i32 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A read-side defect attached to the entity (by DE sequence) it was found
/// in. Parsing collects these instead of aborting; the model still loads the
/// entities it could.
#[derive(Debug)]
pub struct Warning {
    /// DE sequence number of the offending entity, when known.
    pub de: Option<u32>,
    pub error: Error,
}

impl Warning {
    pub fn new(de: Option<u32>, error: Error) -> Self {
        Warning { de, error }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.de {
            Some(de) => write!(f, "DE {}: {}", de, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}
