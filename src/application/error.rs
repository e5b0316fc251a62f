//! Application-level errors (wraps domain errors)

use std::fmt;
use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

use crate::domain::DomainError;

/// One component file that could not be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFailure {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for ComponentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Registry construction failures. No registry is returned alongside one.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read component directory {path}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load {} component file(s): {}", failures.len(), failures.iter().join("; "))]
    Components { failures: Vec<ComponentFailure> },
}

impl LoadError {
    /// Offending component files, empty for directory-level failures.
    pub fn failures(&self) -> &[ComponentFailure] {
        match self {
            LoadError::DirectoryUnreadable { .. } => &[],
            LoadError::Components { failures } => failures,
        }
    }
}

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("cannot open page {path}")]
    PageOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse page {path}")]
    PageParse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no page for request path: {0}")]
    PageNotFound(String),

    #[error("component <{component}> failed to render")]
    TemplateExecution {
        component: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("component <{component}> produced unusable output")]
    StructuralExtraction {
        component: String,
        #[source]
        source: DomainError,
    },

    #[error("serialization failed: {context}")]
    Serialize {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
