//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of tree structure or of the
/// component output contract. They carry no I/O context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node not found in document")]
    NodeNotFound,

    #[error("node is not a child of the given parent")]
    NotAChild,

    #[error("output has no <html> element")]
    MissingHtml,

    #[error("output has no <body> element")]
    MissingBody,

    #[error("output has an empty <body>")]
    EmptyBody,

    #[error("output has {0} top-level elements, expected exactly one")]
    MultipleRoots(usize),

    #[error("output has text outside its root element: {0:?}")]
    StrayText(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
