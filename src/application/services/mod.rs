//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem) but are themselves
//! concrete structs, not traits.

mod composer;
mod page;
mod registry;

pub use composer::{ComposeOptions, Composer};
pub use page::{resolve_request_path, BuildReport, PageRenderer, INDEX_PAGE, PAGE_EXTENSION};
pub use registry::{
    ComponentDefinition, RegistryOptions, TemplateRegistry, UndefinedMode, DEFAULT_EXTENSION,
};
