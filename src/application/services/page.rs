//! Page rendering service
//!
//! Opens a page file, composes it against the registry and writes the
//! serialized result. Also maps request paths onto page files and builds a
//! whole page tree into an output directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::application::context::SharedData;
use crate::application::services::composer::{ComposeOptions, Composer};
use crate::application::services::registry::TemplateRegistry;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::Document;
use crate::infrastructure::html;
use crate::infrastructure::traits::FileSystem;
use crate::util::path::{clean_url_path, url_extension};

/// The only page extension that may be requested explicitly.
pub const PAGE_EXTENSION: &str = ".html";

/// Page served for `/`.
pub const INDEX_PAGE: &str = "index.html";

/// Summary of a site build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Output files written, in page order
    pub written: Vec<PathBuf>,
}

/// Service rendering page files through the composition engine.
pub struct PageRenderer {
    fs: Arc<dyn FileSystem>,
    registry: Arc<TemplateRegistry>,
    data: Arc<dyn SharedData>,
    options: ComposeOptions,
}

impl PageRenderer {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        registry: Arc<TemplateRegistry>,
        data: Arc<dyn SharedData>,
    ) -> Self {
        Self {
            fs,
            registry,
            data,
            options: ComposeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Render `path` into `sink`.
    ///
    /// Nothing is written unless every stage succeeded.
    #[instrument(level = "debug", skip(self, sink), fields(page = %path.display()))]
    pub fn render_page<W: Write>(&self, path: &Path, mut sink: W) -> ApplicationResult<()> {
        let rendered = self.render_page_to_string(path)?;
        sink.write_all(rendered.as_bytes())
            .map_err(|source| ApplicationError::Serialize {
                context: format!("write rendered page {}", path.display()),
                source,
            })
    }

    /// Render `path` into a string.
    pub fn render_page_to_string(&self, path: &Path) -> ApplicationResult<String> {
        let document = self.compose_page(path)?;
        let rendered = html::node_to_string(&document, document.root()).map_err(|source| {
            ApplicationError::Serialize {
                context: format!("serialize page {}", path.display()),
                source,
            }
        })?;
        debug!("rendered {} ({} bytes)", path.display(), rendered.len());
        Ok(rendered)
    }

    /// Parse `path` and expand its components, returning the composed tree.
    pub fn compose_page(&self, path: &Path) -> ApplicationResult<Document> {
        let mut reader = self.fs.open(path).map_err(|source| ApplicationError::PageOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document =
            html::parse_document(&mut reader).map_err(|source| ApplicationError::PageParse {
                path: path.to_path_buf(),
                source,
            })?;

        let root = document.root();
        Composer::new(&self.registry, Arc::clone(&self.data))
            .with_options(self.options)
            .render(&mut document, root)?;
        Ok(document)
    }

    /// Render every `*.html` file under `pages_root` into `out_dir`, keeping
    /// relative paths. Pages render in parallel against the shared registry;
    /// the first failure aborts the build before anything is written.
    #[instrument(level = "debug", skip(self))]
    pub fn build_site(&self, pages_root: &Path, out_dir: &Path) -> ApplicationResult<BuildReport> {
        let pages = self.page_files(pages_root, out_dir)?;
        info!("building {} page(s) from {}", pages.len(), pages_root.display());

        let rendered = pages
            .par_iter()
            .map(|page| {
                let relative = pathdiff::diff_paths(page, pages_root)
                    .unwrap_or_else(|| PathBuf::from(page.file_name().unwrap_or_default()));
                self.render_page_to_string(page)
                    .map(|html| (out_dir.join(relative), html))
                    .inspect_err(|e| warn!("page {} failed: {}", page.display(), e))
            })
            .collect::<ApplicationResult<Vec<_>>>()?;

        let mut report = BuildReport::default();
        for (target, html) in rendered {
            self.fs
                .ensure_parent(&target)
                .with_path_context("create output directory", &target)?;
            self.fs
                .write(&target, &html)
                .with_path_context("write page", &target)?;
            report.written.push(target);
        }
        Ok(report)
    }

    fn page_files(&self, pages_root: &Path, out_dir: &Path) -> ApplicationResult<Vec<PathBuf>> {
        if !self.fs.is_dir(pages_root) {
            return Err(ApplicationError::PageOpen {
                path: pages_root.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }
        let out_dir = self
            .fs
            .canonicalize(out_dir)
            .unwrap_or_else(|_| out_dir.to_path_buf());

        let mut pages = Vec::new();
        for entry in walkdir::WalkDir::new(pages_root).sort_by_file_name() {
            let entry = entry.map_err(|e| ApplicationError::OperationFailed {
                context: format!("scan pages in {}", pages_root.display()),
                source: Box::new(e),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_page_file(path) {
                continue;
            }
            let canonical = self
                .fs
                .canonicalize(path)
                .unwrap_or_else(|_| path.to_path_buf());
            if canonical.starts_with(&out_dir) {
                continue;
            }
            pages.push(path.to_path_buf());
        }
        Ok(pages)
    }
}

fn is_page_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| PAGE_EXTENSION.strip_prefix('.') == ext.to_str())
        .unwrap_or(false)
}

/// Map a request path to a page file under `pages_root`.
///
/// The path is cleaned so it cannot leave the root; `/` maps to
/// `index.html`, extension-less paths get `.html`, and any extension other
/// than `.html` has no page.
pub fn resolve_request_path(pages_root: &Path, request_path: &str) -> Option<PathBuf> {
    let cleaned = clean_url_path(request_path);
    let name = match url_extension(&cleaned) {
        "" if cleaned == "/" => INDEX_PAGE.to_string(),
        "" => format!("{}{}", cleaned.trim_start_matches('/'), PAGE_EXTENSION),
        PAGE_EXTENSION => cleaned.trim_start_matches('/').to_string(),
        _ => return None,
    };
    Some(pages_root.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/", Some("pages/index.html"))]
    #[case("/about", Some("pages/about.html"))]
    #[case("/about.html", Some("pages/about.html"))]
    #[case("/docs/intro", Some("pages/docs/intro.html"))]
    #[case("/docs/../../secret", Some("pages/secret.html"))]
    #[case("/style.css", None)]
    #[case("/image.HTML", None)]
    #[case("/.html", Some("pages/.html"))]
    fn given_request_path_when_resolving_then_mapped_under_root(
        #[case] request: &str,
        #[case] expected: Option<&str>,
    ) {
        let resolved = resolve_request_path(Path::new("pages"), request);

        assert_eq!(resolved, expected.map(PathBuf::from));
    }

    #[test]
    fn given_page_extensions_when_checking_then_only_html() {
        assert!(is_page_file(Path::new("a/index.html")));
        assert!(!is_page_file(Path::new("a/index.htm")));
        assert!(!is_page_file(Path::new("a/button.tmpl")));
    }
}
