//! Service container for dependency injection
//!
//! Wires the registry and page renderer to settings and the filesystem.

use std::sync::Arc;

use tracing::instrument;

use crate::application::services::{PageRenderer, TemplateRegistry};
use crate::application::{ApplicationError, DataFile, SharedData};
use crate::config::Settings;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::InfraResult;

/// Container holding the services of one invocation.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Data exposed to every template as `data`
    pub data: Arc<dyn SharedData>,
}

impl ServiceContainer {
    /// Create a container with the real filesystem, loading the configured
    /// data file if any.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        let data: Arc<dyn SharedData> = match &settings.data_file {
            Some(path) => Arc::new(DataFile::load(path)?),
            None => Arc::new(()),
        };
        Ok(Self::with_deps(settings, Arc::new(RealFileSystem), data))
    }

    /// Create a container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        data: Arc<dyn SharedData>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self { settings, fs, data }
    }

    /// Load the component registry from the configured directory.
    #[instrument(level = "debug", skip(self))]
    pub fn registry(&self) -> Result<TemplateRegistry, ApplicationError> {
        let registry = TemplateRegistry::load(
            self.fs.as_ref(),
            &self.settings.components_dir,
            &self.settings.registry_options(),
        )?;
        Ok(registry)
    }

    /// Page renderer backed by a freshly loaded registry.
    pub fn page_renderer(&self) -> Result<PageRenderer, ApplicationError> {
        let registry = Arc::new(self.registry()?);
        Ok(PageRenderer::new(Arc::clone(&self.fs), registry, Arc::clone(&self.data))
            .with_options(self.settings.compose_options()))
    }
}
