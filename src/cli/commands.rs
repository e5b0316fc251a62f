//! Command dispatch

use std::io::{self, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::resolve_request_path;
use crate::application::{ApplicationError, IoResultExt};
use crate::cli::args::{Cli, Commands};
use crate::cli::error::CliResult;
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;
use crate::tree_traits::TreeNodeConvert;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    if let Commands::Completion { shell } = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let settings = load_settings(cli)?;
    if let Commands::Config = &cli.command {
        return _config(&settings);
    }

    let container = ServiceContainer::new(settings)?;
    match &cli.command {
        Commands::Render { page, output } => _render(&container, page, output.as_deref()),
        Commands::Resolve { request_path } => _resolve(&container, request_path),
        Commands::ServePath { request_path } => _serve_path(&container, request_path),
        Commands::Build { out_dir } => _build(&container, out_dir),
        Commands::Components => _components(&container),
        Commands::Outline { page } => _outline(&container, page),
        Commands::Config | Commands::Completion { .. } => Ok(()),
    }
}

/// Layered settings with command-line flags applied last.
fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.components {
        settings.components_dir = dir.clone();
    }
    if let Some(dir) = &cli.pages {
        settings.pages_dir = dir.clone();
    }
    if let Some(file) = &cli.data {
        settings.data_file = Some(file.clone());
    }
    debug!("settings: {:?}", settings);
    Ok(settings)
}

#[instrument(skip(container))]
fn _render(container: &ServiceContainer, page: &Path, out: Option<&Path>) -> CliResult<()> {
    let renderer = container.page_renderer()?;
    match out {
        None => {
            let stdout = io::stdout();
            renderer.render_page(page, stdout.lock())?;
            io::stdout()
                .flush()
                .map_err(|e| InfraError::io("flush stdout", e))?;
        }
        Some(target) => {
            let rendered = renderer.render_page_to_string(page)?;
            container
                .fs
                .ensure_parent(target)
                .with_path_context("create output directory", target)?;
            container
                .fs
                .write(target, &rendered)
                .with_path_context("write page", target)?;
            output::action("Rendered", &target.display());
        }
    }
    Ok(())
}

#[instrument(skip(container))]
fn _resolve(container: &ServiceContainer, request_path: &str) -> CliResult<()> {
    let page = resolve_request_path(&container.settings.pages_dir, request_path)
        .ok_or_else(|| ApplicationError::PageNotFound(request_path.to_string()))?;
    output::info(&page.display());
    Ok(())
}

#[instrument(skip(container))]
fn _serve_path(container: &ServiceContainer, request_path: &str) -> CliResult<()> {
    let page = resolve_request_path(&container.settings.pages_dir, request_path)
        .filter(|page| container.fs.is_file(page))
        .ok_or_else(|| ApplicationError::PageNotFound(request_path.to_string()))?;
    debug!("{} -> {}", request_path, page.display());
    _render(container, &page, None)
}

#[instrument(skip(container))]
fn _build(container: &ServiceContainer, out_dir: &Path) -> CliResult<()> {
    let renderer = container.page_renderer()?;
    let report = renderer.build_site(&container.settings.pages_dir, out_dir)?;
    for path in &report.written {
        output::detail(&path.display());
    }
    output::success(&format!(
        "built {} page(s) into {}",
        report.written.len(),
        out_dir.display()
    ));
    Ok(())
}

#[instrument(skip(container))]
fn _components(container: &ServiceContainer) -> CliResult<()> {
    let registry = container.registry()?;
    output::header(&format!(
        "{} component(s) in {}",
        registry.len(),
        container.settings.components_dir.display()
    ));
    for component in registry.components() {
        output::detail(&format!("<{}>  {}", component.name, component.path.display()));
    }
    Ok(())
}

#[instrument(skip(container))]
fn _outline(container: &ServiceContainer, page: &Path) -> CliResult<()> {
    let renderer = container.page_renderer()?;
    let document = renderer.compose_page(page)?;
    output::info(&document.to_tree_string());
    Ok(())
}

fn _config(settings: &Settings) -> CliResult<()> {
    if let Some(path) = global_config_path() {
        output::header(&format!("# global config: {}", path.display()));
    }
    output::info(&settings.to_toml()?);
    Ok(())
}
