//! Unified error types for the storm drain interchange crates
//!
//! [`SdiError`] is the error returned across crate boundaries. Each variant
//! maps to one class of the error taxonomy: fatal document errors, rename
//! collisions, lookups of missing entities and backend integrity failures.
//! Row-level problems are never errors; they travel as
//! [`DiagnosticIssue`](crate::diagnostics::DiagnosticIssue)s instead.
//!
//! # Example
//!
//! ```ignore
//! use sdi_core::{SdiError, SdiResult};
//!
//! fn rename_node(store: &mut Store, old: &str, new: &str) -> SdiResult<()> {
//!     store.rename(EntityKind::Node, old, new)?;
//!     Ok(())
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entity families that share a name space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Node,
    StorageUnit,
    Conduit,
    Pump,
    Orifice,
    Weir,
    Curve,
    Pattern,
    TimeSeries,
    RatingTable,
    Culvert,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::Node,
        EntityKind::StorageUnit,
        EntityKind::Conduit,
        EntityKind::Pump,
        EntityKind::Orifice,
        EntityKind::Weir,
        EntityKind::Curve,
        EntityKind::Pattern,
        EntityKind::TimeSeries,
        EntityKind::RatingTable,
        EntityKind::Culvert,
    ];

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::StorageUnit => "storage unit",
            EntityKind::Conduit => "conduit",
            EntityKind::Pump => "pump",
            EntityKind::Orifice => "orifice",
            EntityKind::Weir => "weir",
            EntityKind::Curve => "curve",
            EntityKind::Pattern => "pattern",
            EntityKind::TimeSeries => "time series",
            EntityKind::RatingTable => "rating table",
            EntityKind::Culvert => "culvert equation",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unified error type for interchange operations.
#[derive(Error, Debug)]
pub enum SdiError {
    /// The INP text has no section delimiters, or could not be read at all
    #[error("malformed INP document: {0}")]
    MalformedDocument(String),

    /// Rename target already exists within the entity kind
    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },

    /// Explicit lookup of an entity that does not exist
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    /// Constraint violation reported by the database backend
    #[error("integrity error: {0}")]
    Integrity(String),

    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration load/save errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Value coercion errors outside of record parsing
    #[error("parse error: {0}")]
    Parse(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using SdiError.
pub type SdiResult<T> = Result<T, SdiError>;

impl From<anyhow::Error> for SdiError {
    fn from(err: anyhow::Error) -> Self {
        SdiError::Other(format!("{err:#}"))
    }
}

impl From<toml::de::Error> for SdiError {
    fn from(err: toml::de::Error) -> Self {
        SdiError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SdiError {
    fn from(err: toml::ser::Error) -> Self {
        SdiError::Config(err.to_string())
    }
}
