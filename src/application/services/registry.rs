//! Component template registry
//!
//! Loads every component file from one directory, compiles it once and
//! indexes it by its lower-cased filename stem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::application::context::RenderContext;
use crate::application::{ComponentFailure, LoadError};
use crate::infrastructure::traits::FileSystem;

/// Default component file extension.
pub const DEFAULT_EXTENSION: &str = "tmpl";

/// How templates treat undefined variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UndefinedMode {
    /// Undefined values render as empty
    #[default]
    Lenient,
    /// Any use of an undefined value fails the render
    Strict,
}

impl From<UndefinedMode> for UndefinedBehavior {
    fn from(mode: UndefinedMode) -> Self {
        match mode {
            UndefinedMode::Lenient => UndefinedBehavior::Lenient,
            UndefinedMode::Strict => UndefinedBehavior::Strict,
        }
    }
}

/// Registry loading options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    /// File extension (without dot) that marks component files
    pub extension: String,
    pub undefined: UndefinedMode,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            undefined: UndefinedMode::default(),
        }
    }
}

/// A registered component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDefinition {
    /// Tag name this component replaces
    pub name: String,
    /// File the template was compiled from
    pub path: PathBuf,
}

/// Immutable name → component index with the compiled templates.
///
/// Read-only after [`TemplateRegistry::load`]; lookups and executions take
/// `&self` and may run concurrently.
pub struct TemplateRegistry {
    env: Environment<'static>,
    components: BTreeMap<String, ComponentDefinition>,
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TemplateRegistry {
    /// Load every `*.<extension>` file directly inside `dir`.
    ///
    /// All files are attempted; if any fails to read, compile or register,
    /// the error lists each offending file and no registry is returned.
    #[instrument(level = "debug", skip(fs, options), fields(dir = %dir.display()))]
    pub fn load(
        fs: &dyn FileSystem,
        dir: &Path,
        options: &RegistryOptions,
    ) -> Result<Self, LoadError> {
        let files = Self::component_files(fs, dir, &options.extension)?;

        let mut env = Environment::new();
        // Every component is HTML regardless of its file extension.
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_undefined_behavior(options.undefined.into());

        let mut components: BTreeMap<String, ComponentDefinition> = BTreeMap::new();
        let mut failures = Vec::new();
        for (name, path) in files {
            if let Some(existing) = components.get(&name) {
                failures.push(ComponentFailure {
                    message: format!(
                        "component name {:?} already defined by {}",
                        name,
                        existing.path.display()
                    ),
                    path,
                });
                continue;
            }
            let source = match fs.read_to_string(&path) {
                Ok(source) => source,
                Err(e) => {
                    failures.push(ComponentFailure {
                        path,
                        message: format!("read failed: {}", e),
                    });
                    continue;
                }
            };
            if let Err(e) = env.add_template_owned(name.clone(), source) {
                failures.push(ComponentFailure {
                    path,
                    message: format!("compile failed: {}", e),
                });
                continue;
            }
            debug!("registered component <{}> from {}", name, path.display());
            components.insert(name.clone(), ComponentDefinition { name, path });
        }

        if !failures.is_empty() {
            return Err(LoadError::Components { failures });
        }
        info!(
            "loaded {} component(s) from {}",
            components.len(),
            dir.display()
        );
        Ok(Self { env, components })
    }

    /// Candidate files in `dir`, sorted by file name, paired with their
    /// component names.
    fn component_files(
        fs: &dyn FileSystem,
        dir: &Path,
        extension: &str,
    ) -> Result<Vec<(String, PathBuf)>, LoadError> {
        if !fs.is_dir(dir) {
            return Err(LoadError::DirectoryUnreadable {
                path: dir.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| LoadError::DirectoryUnreadable {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            let path = entry.path();
            if !fs.is_file(path) {
                continue;
            }
            let matches = path.extension().map(|ext| ext == extension).unwrap_or(false);
            if !matches {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                files.push((component_name(&stem.to_string_lossy()), path.to_path_buf()));
            }
        }
        Ok(files)
    }

    /// Component registered for `tag`, if any. Absence means "not a component".
    pub fn lookup(&self, tag: &str) -> Option<&ComponentDefinition> {
        self.components.get(&component_name(tag))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn components(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Run a component's compiled template against `context`.
    pub fn execute(
        &self,
        definition: &ComponentDefinition,
        context: &RenderContext,
    ) -> Result<String, minijinja::Error> {
        self.env
            .get_template(&definition.name)?
            .render(context.to_value())
    }
}

/// Normalize a filename stem or tag name the way the HTML parser normalizes
/// tag names.
fn component_name(raw: &str) -> String {
    raw.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::traits::RealFileSystem;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn given_mixed_case_stem_when_looking_up_then_case_insensitive() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Nav-Bar.tmpl"), "<nav></nav>").unwrap();

        let registry =
            TemplateRegistry::load(&RealFileSystem, temp.path(), &RegistryOptions::default())
                .unwrap();

        assert!(registry.lookup("nav-bar").is_some());
        assert!(registry.lookup("NAV-BAR").is_some());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["nav-bar"]);
    }

    #[test]
    fn given_strict_undefined_when_executing_missing_value_then_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("x.tmpl"), "<p>{{ nope.deeper }}</p>").unwrap();
        let options = RegistryOptions {
            undefined: UndefinedMode::Strict,
            ..Default::default()
        };
        let registry = TemplateRegistry::load(&RealFileSystem, temp.path(), &options).unwrap();
        let definition = registry.lookup("x").unwrap().clone();
        let context = RenderContext::new(String::new(), BTreeMap::new(), Arc::new(()));

        assert!(registry.execute(&definition, &context).is_err());
    }
}
