//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/reago/reago.toml`
//! 3. Local config: `./reago.toml` or an explicit `--config` file
//! 4. Environment variables: `REAGO_*` prefix
//!
//! Command-line flags are applied on top by the CLI layer.

use std::path::{Path, PathBuf};

use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::services::{RegistryOptions, UndefinedMode, DEFAULT_EXTENSION};
use crate::application::services::ComposeOptions;
use crate::application::ApplicationError;
use crate::domain::ExtractionPolicy;
use crate::util::path::expand_path;

/// Name of the project-local config file.
pub const LOCAL_CONFIG_FILE: &str = "reago.toml";

/// Unified configuration for reago.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directory holding component templates (default: ./components)
    pub components_dir: PathBuf,
    /// Directory holding page files (default: ./pages)
    pub pages_dir: PathBuf,
    /// Component file extension without the dot (default: tmpl)
    pub extension: String,
    /// How the replacement node is taken from component output
    pub extraction: ExtractionPolicy,
    /// Undefined-variable handling in templates
    pub undefined: UndefinedMode,
    /// Reuse output of identical expansions within one page
    pub memoize: bool,
    /// Optional TOML file exposed to templates as `data`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            components_dir: PathBuf::from("./components"),
            pages_dir: PathBuf::from("./pages"),
            extension: DEFAULT_EXTENSION.to_string(),
            extraction: ExtractionPolicy::default(),
            undefined: UndefinedMode::default(),
            memoize: false,
            data_file: None,
        }
    }
}

/// Get the XDG config directory for reago.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "reago").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("reago.toml"))
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// `config_file` replaces the implicit `./reago.toml` and must exist.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let global = global_config_path();
        match config_file {
            Some(path) => Self::load_from(global.as_deref(), Some(path), true),
            None => Self::load_from(global.as_deref(), Some(Path::new(LOCAL_CONFIG_FILE)), false),
        }
    }

    /// Load settings from explicit file layers plus `REAGO_*` variables.
    ///
    /// The global file is always optional; `local_required` controls whether
    /// a missing local file is an error.
    pub fn load_from(
        global: Option<&Path>,
        local: Option<&Path>,
        local_required: bool,
    ) -> Result<Self, ApplicationError> {
        let mut builder = Self::defaults_builder()?;

        if let Some(global) = global {
            builder = builder.add_source(File::from(global).required(false));
        }
        if let Some(local) = local {
            builder = builder.add_source(File::from(local).required(local_required));
        }
        builder = builder.add_source(
            Environment::with_prefix("REAGO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;
        let mut settings: Self = config.try_deserialize().map_err(config_err)?;

        // Expand ~ and $VAR in path-like fields
        settings.expand_paths();

        Ok(settings)
    }

    fn defaults_builder(
    ) -> Result<ConfigBuilder<config::builder::DefaultState>, ApplicationError> {
        let defaults = Settings::default();
        Config::builder()
            .set_default(
                "components_dir",
                defaults.components_dir.to_string_lossy().to_string(),
            )
            .map_err(config_err)?
            .set_default("pages_dir", defaults.pages_dir.to_string_lossy().to_string())
            .map_err(config_err)?
            .set_default("extension", defaults.extension)
            .map_err(config_err)?
            .set_default("extraction", "first-child")
            .map_err(config_err)?
            .set_default("undefined", "lenient")
            .map_err(config_err)?
            .set_default("memoize", defaults.memoize)
            .map_err(config_err)
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        self.components_dir = expand_path(&self.components_dir);
        self.pages_dir = expand_path(&self.pages_dir);
        self.data_file = self.data_file.as_deref().map(expand_path);
    }

    /// Registry options derived from these settings.
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            extension: self.extension.trim_start_matches('.').to_string(),
            undefined: self.undefined,
        }
    }

    /// Composition options derived from these settings.
    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions {
            extraction: self.extraction,
            memoize: self.memoize,
        }
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_default_settings_when_deriving_options_then_defaults_flow_through() {
        let settings = Settings::default();

        let registry = settings.registry_options();
        let compose = settings.compose_options();

        assert_eq!(registry.extension, "tmpl");
        assert_eq!(registry.undefined, UndefinedMode::Lenient);
        assert_eq!(compose.extraction, ExtractionPolicy::FirstChild);
        assert!(!compose.memoize);
    }

    #[test]
    fn given_dotted_extension_when_deriving_registry_options_then_dot_stripped() {
        let settings = Settings {
            extension: ".gohtml".to_string(),
            ..Default::default()
        };

        assert_eq!(settings.registry_options().extension, "gohtml");
    }

    #[test]
    fn given_settings_when_serializing_then_kebab_case_enums() {
        let settings = Settings {
            extraction: ExtractionPolicy::SingleElement,
            undefined: UndefinedMode::Strict,
            ..Default::default()
        };

        let toml = settings.to_toml().unwrap();

        assert!(toml.contains("extraction = \"single-element\""));
        assert!(toml.contains("undefined = \"strict\""));
    }
}
