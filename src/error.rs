//! Error types for planning.
//!
//! Every failure here reflects an invalid query or an invalid plan shape,
//! never a transient condition, so nothing is retried.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Column '{0}' is ambiguous")]
    AmbiguousColumn(String),

    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    /// Two visible tables share the qualifier
    #[error("Not unique table/alias: '{0}'")]
    NonUniqueTable(String),

    /// A column reference reached type inference without being bound
    #[error("Column '{0}' is not bound to any table")]
    UnresolvedColumn(String),

    #[error("Table '{0}' already exists")]
    DuplicateTable(String),

    #[error("Duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// The function cannot be rebuilt or rendered for a shard
    #[error("Unexpected function: {0}")]
    Unsupported(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function {0} is already registered")]
    DuplicateFunction(String),

    #[error("Function {function} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("Invalid plan node: {0}")]
    InvalidPlanNode(String),
}

impl PlanError {
    /// A name could not be bound; the whole fix-up pass is aborted
    pub fn is_binding_failure(&self) -> bool {
        matches!(
            self,
            PlanError::UnknownColumn(_)
                | PlanError::AmbiguousColumn(_)
                | PlanError::UnknownTable(_)
                | PlanError::NonUniqueTable(_)
                | PlanError::UnresolvedColumn(_)
        )
    }

    /// The construct has no external representation
    pub fn is_unsupported(&self) -> bool {
        matches!(self, PlanError::Unsupported(_))
    }
}

/// Result type for planning operations
pub type Result<T> = std::result::Result<T, PlanError>;
