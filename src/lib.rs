//! reago: server-side HTML composition with component templates.
//!
//! Pages are parsed into an arena document; every element whose tag names a
//! registered component is replaced, children first, by the single node its
//! template renders to.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;
