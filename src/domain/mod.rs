//! Domain layer: the document tree model and structural rules
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod error;
pub mod extract;

pub use arena::{Attr, Document, Node, NodeData, NodeId, TreeIterator};
pub use error::{DomainError, DomainResult};
pub use extract::{extract_body_root, ExtractionPolicy};
