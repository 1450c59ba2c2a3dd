//! Export errors.

use mobex_lower::{GraphError, LowerError};

/// Why an export failed.
///
/// Every variant is fatal: the container written so far is incomplete and
/// must be discarded.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A method uses a construct the mobile runtime cannot execute.
    #[error(transparent)]
    Lower(#[from] LowerError),

    /// A method body could not be printed as source.
    #[error("`{method}`: malformed graph: {source}")]
    MalformedMethod {
        method: String,
        #[source]
        source: GraphError,
    },

    /// A read-back table did not have the expected shape.
    #[error("malformed table: expected {expected}, found {found}")]
    MalformedTable { expected: &'static str, found: String },

    /// An operator entry did not have exactly two fields.
    #[error("operator name entry has {arity} fields, expected 2 (name, overload)")]
    MalformedOperatorName { arity: usize },

    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("pickling failed: {0}")]
    Pickle(#[from] bincode::Error),

    #[error("writing record failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub(crate) fn table(expected: &'static str, found: &mobex_ir::Value) -> Self {
        ExportError::MalformedTable {
            expected,
            found: found.tag_kind().to_owned(),
        }
    }
}
