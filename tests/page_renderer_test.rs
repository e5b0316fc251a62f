//! Tests for PageRenderer: end-to-end page rendering and site builds

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rstest::rstest;
use tempfile::TempDir;

use reago::application::services::{
    resolve_request_path, ComposeOptions, PageRenderer, RegistryOptions, TemplateRegistry,
};
use reago::application::{ApplicationError, DataFile};
use reago::infrastructure::traits::RealFileSystem;

/// Helper to create a file, including parent directories
fn create_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(&path, content).expect("write file");
    path
}

/// Site fixture with a components/ and pages/ directory
struct Site {
    temp: TempDir,
}

impl Site {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        create_file(
            temp.path(),
            "components/button-tag.tmpl",
            "<button type=\"button\">{{ content }}</button>",
        );
        create_file(
            temp.path(),
            "components/layout.tmpl",
            "<div class=\"layout\"><h1>{{ attributes.title }}</h1>{{ content }}</div>",
        );
        Self { temp }
    }

    fn components(&self) -> PathBuf {
        self.temp.path().join("components")
    }

    fn pages(&self) -> PathBuf {
        self.temp.path().join("pages")
    }

    fn page(&self, relative: &str, content: &str) -> PathBuf {
        create_file(&self.pages(), relative, content)
    }

    fn renderer(&self) -> PageRenderer {
        let registry = TemplateRegistry::load(
            &RealFileSystem,
            &self.components(),
            &RegistryOptions::default(),
        )
        .expect("load registry");
        PageRenderer::new(Arc::new(RealFileSystem), Arc::new(registry), Arc::new(()))
    }
}

#[test]
fn given_button_page_when_rendering_then_component_expanded_in_place() {
    // Arrange
    let site = Site::new();
    let page = site.page(
        "index.html",
        "<!DOCTYPE html><html><head><title>T</title></head><body><p>before</p><button-tag>Hello!</button-tag><p>after</p></body></html>",
    );
    let renderer = site.renderer();

    // Act
    let mut out = Vec::new();
    renderer.render_page(&page, &mut out).unwrap();

    // Assert
    let rendered = String::from_utf8(out).unwrap();
    assert_eq!(
        rendered,
        "<!DOCTYPE html><html><head><title>T</title></head><body><p>before</p><button type=\"button\">Hello!</button><p>after</p></body></html>"
    );
}

#[test]
fn given_same_page_when_rendering_twice_then_byte_identical() {
    let site = Site::new();
    let page = site.page(
        "index.html",
        "<html><body><layout title=\"Home\"><button-tag>Go</button-tag></layout></body></html>",
    );
    let renderer = site.renderer();

    let first = renderer.render_page_to_string(&page).unwrap();
    let second = renderer.render_page_to_string(&page).unwrap();

    assert_eq!(first, second);
    assert!(first.contains(
        "<div class=\"layout\"><h1>Home</h1><button type=\"button\">Go</button></div>"
    ));
}

#[test]
fn given_missing_page_when_rendering_then_page_open_error() {
    let site = Site::new();
    let missing = site.pages().join("nope.html");

    let err = site
        .renderer()
        .render_page(&missing, Vec::new())
        .unwrap_err();

    match err {
        ApplicationError::PageOpen { path, .. } => assert_eq!(path, missing),
        other => panic!("expected PageOpen, got {:?}", other),
    }
}

#[test]
fn given_unreadable_page_when_rendering_then_page_parse_error() {
    // Arrange: a directory opens but cannot be read
    let site = Site::new();
    let dir = site.pages().join("folder.html");
    std::fs::create_dir_all(&dir).unwrap();

    // Act
    let err = site.renderer().render_page(&dir, Vec::new()).unwrap_err();

    // Assert
    assert!(matches!(err, ApplicationError::PageParse { .. }), "{:?}", err);
}

#[test]
fn given_failing_component_when_rendering_then_nothing_written() {
    // Arrange
    let site = Site::new();
    create_file(
        &site.components(),
        "broken.tmpl",
        "<p>{% include \"missing\" %}</p>",
    );
    let page = site.page("index.html", "<p>ok</p><broken></broken>");

    // Act
    let mut out = Vec::new();
    let err = site.renderer().render_page(&page, &mut out).unwrap_err();

    // Assert
    assert!(matches!(err, ApplicationError::TemplateExecution { .. }));
    assert!(out.is_empty());
}

#[test]
fn given_data_file_when_rendering_then_template_reads_toml_values() {
    // Arrange
    let site = Site::new();
    create_file(
        &site.components(),
        "nav.tmpl",
        "<nav>{% for link in data.links %}<a href=\"{{ link.href }}\">{{ link.label }}</a>{% endfor %}</nav>",
    );
    let data = DataFile::from_toml_str(
        r#"
[[links]]
href = "/"
label = "Home"

[[links]]
href = "/about"
label = "About"
"#,
    )
    .unwrap();
    let page = site.page("index.html", "<nav></nav>");
    let registry = TemplateRegistry::load(
        &RealFileSystem,
        &site.components(),
        &RegistryOptions::default(),
    )
    .unwrap();
    let renderer = PageRenderer::new(Arc::new(RealFileSystem), Arc::new(registry), Arc::new(data));

    // Act
    let rendered = renderer.render_page_to_string(&page).unwrap();

    // Assert
    assert!(
        rendered.contains("<nav><a href=\"/\">Home</a><a href=\"/about\">About</a></nav>"),
        "{}",
        rendered
    );
}

#[test]
fn given_shared_registry_when_rendering_from_threads_then_outputs_agree() {
    // Arrange
    let site = Site::new();
    let pages: Vec<PathBuf> = (0..8)
        .map(|i| {
            site.page(
                &format!("p{i}.html"),
                &format!("<layout title=\"P{i}\"><button-tag>{i}</button-tag></layout>"),
            )
        })
        .collect();
    let renderer = site.renderer();
    let shared = &renderer;

    // Act
    let rendered: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = pages
            .iter()
            .map(|page| scope.spawn(move || shared.render_page_to_string(page).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Assert
    for (i, html) in rendered.iter().enumerate() {
        assert_eq!(*html, renderer.render_page_to_string(&pages[i]).unwrap());
        assert!(html.contains(&format!("<h1>P{i}</h1><button type=\"button\">{i}</button>")));
    }
}

#[test]
fn given_page_tree_when_building_site_then_mirrored_into_output() {
    // Arrange
    let site = Site::new();
    site.page("index.html", "<button-tag>Home</button-tag>");
    site.page("docs/intro.html", "<layout title=\"Intro\"></layout>");
    site.page("docs/notes.txt", "not a page");
    let out = site.temp.path().join("public");

    // Act
    let report = site
        .renderer()
        .with_options(ComposeOptions::default())
        .build_site(&site.pages(), &out)
        .unwrap();

    // Assert
    assert_eq!(
        report.written,
        vec![out.join("docs/intro.html"), out.join("index.html")]
    );
    let index = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains("<button type=\"button\">Home</button>"));
    let intro = std::fs::read_to_string(out.join("docs/intro.html")).unwrap();
    assert!(intro.contains("<h1>Intro</h1>"));
    assert!(!out.join("docs/notes.txt").exists());
}

#[test]
fn given_failing_page_when_building_site_then_no_output_written() {
    let site = Site::new();
    create_file(&site.components(), "broken.tmpl", "");
    site.page("a.html", "<button-tag>ok</button-tag>");
    site.page("b.html", "<broken></broken>");
    let out = site.temp.path().join("public");

    let err = site.renderer().build_site(&site.pages(), &out).unwrap_err();

    assert!(matches!(err, ApplicationError::StructuralExtraction { .. }));
    assert!(!out.exists());
}

#[rstest]
#[case("/", "index.html")]
#[case("/docs/intro", "docs/intro.html")]
#[case("/../../index.html", "index.html")]
fn given_request_path_when_resolving_then_existing_page_renders(
    #[case] request: &str,
    #[case] expected: &str,
) {
    let site = Site::new();
    site.page("index.html", "<button-tag>Home</button-tag>");
    site.page("docs/intro.html", "<layout title=\"Intro\"></layout>");

    let page = resolve_request_path(&site.pages(), request).unwrap();

    assert_eq!(page, site.pages().join(expected));
    assert!(site.renderer().render_page_to_string(&page).is_ok());
}

#[test]
fn given_disallowed_extension_when_resolving_then_no_page() {
    let site = Site::new();

    assert!(resolve_request_path(&site.pages(), "/style.css").is_none());
}
