//! Render context handed to one component template execution.
//!
//! Templates see three names:
//! - `content`: inner HTML of the component tag, inserted verbatim
//! - `attributes`: the tag's HTML attributes as a string map
//! - `data`: the caller's [`SharedData`] handle

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use minijinja::value::{Object, Value};
use minijinja::{context, Error, ErrorKind, State};
use serde::Deserialize;
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult};

/// Data source exposed to templates as `data`.
///
/// Implementations are shared by every in-flight render and must do their
/// own synchronization if they hold mutable state.
pub trait SharedData: fmt::Debug + Send + Sync + 'static {
    /// Attribute access: `data.key` / `data["key"]`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Method call: `data.method(args...)`.
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, Error> {
        let _ = args;
        Err(Error::new(
            ErrorKind::UnknownMethod,
            format!("shared data has no method {method:?}"),
        ))
    }
}

/// No shared data; every lookup is undefined.
impl SharedData for () {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }
}

/// Template-side view of a [`SharedData`] handle.
#[derive(Debug)]
struct SharedDataObject(Arc<dyn SharedData>);

impl Object for SharedDataObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        key.as_str().and_then(|key| self.0.get(key))
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        self.0.call(method, args)
    }
}

/// Per-expansion data bundle. Built right before one template execution.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Serialized inner HTML of the matched tag, already escaped
    pub content: String,
    /// Attributes of the matched tag, exactly as parsed
    pub attributes: BTreeMap<String, String>,
    /// Opaque caller data
    pub data: Arc<dyn SharedData>,
}

impl RenderContext {
    pub fn new(
        content: String,
        attributes: BTreeMap<String, String>,
        data: Arc<dyn SharedData>,
    ) -> Self {
        Self {
            content,
            attributes,
            data,
        }
    }

    /// Template engine value for this context.
    pub fn to_value(&self) -> Value {
        context! {
            content => Value::from_safe_string(self.content.clone()),
            attributes => &self.attributes,
            data => Value::from_object(SharedDataObject(Arc::clone(&self.data))),
        }
    }
}

/// Shared data read from a TOML file; each top-level key becomes `data.<key>`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DataFile {
    values: BTreeMap<String, toml::Value>,
}

impl DataFile {
    pub fn load(path: &Path) -> ApplicationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
            message: format!("read data file {}: {}", path.display(), e),
        })?;
        let data = Self::from_toml_str(&content).map_err(|e| ApplicationError::Config {
            message: format!("parse data file {}: {}", path.display(), e),
        })?;
        debug!("loaded data file {} with {} keys", path.display(), data.values.len());
        Ok(data)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl SharedData for DataFile {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(Value::from_serialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::Environment;

    #[derive(Debug)]
    struct Counter;

    impl SharedData for Counter {
        fn get(&self, key: &str) -> Option<Value> {
            (key == "name").then(|| Value::from("counter"))
        }

        fn call(&self, method: &str, args: &[Value]) -> Result<Value, Error> {
            match method {
                "double" => {
                    let n = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
                    Ok(Value::from(n * 2))
                }
                _ => Err(Error::new(ErrorKind::UnknownMethod, method.to_string())),
            }
        }
    }

    fn render(source: &str, ctx: &RenderContext) -> Result<String, Error> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::Html);
        env.add_template("t", source)?;
        env.get_template("t")?.render(ctx.to_value())
    }

    #[test]
    fn given_content_with_markup_when_rendering_then_inserted_verbatim() {
        let ctx = RenderContext::new("<b>bold</b> &amp;".into(), BTreeMap::new(), Arc::new(()));

        let out = render("<div>{{ content }}</div>", &ctx).unwrap();

        assert_eq!(out, "<div><b>bold</b> &amp;</div>");
    }

    #[test]
    fn given_attribute_with_markup_when_rendering_then_escaped() {
        let attributes = BTreeMap::from([("title".to_string(), "a<b".to_string())]);
        let ctx = RenderContext::new(String::new(), attributes, Arc::new(()));

        let out = render("<p title=\"{{ attributes.title }}\"></p>", &ctx).unwrap();

        assert_eq!(out, "<p title=\"a&lt;b\"></p>");
    }

    #[test]
    fn given_shared_data_when_rendering_then_attributes_and_methods_reachable() {
        let ctx = RenderContext::new(String::new(), BTreeMap::new(), Arc::new(Counter));

        let out = render("{{ data.name }}={{ data.double(21) }}", &ctx).unwrap();

        assert_eq!(out, "counter=42");
    }

    #[test]
    fn given_unknown_method_when_rendering_then_error() {
        let ctx = RenderContext::new(String::new(), BTreeMap::new(), Arc::new(()));

        let err = render("{{ data.table() }}", &ctx).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnknownMethod);
    }

    #[test]
    fn given_toml_data_file_when_rendering_then_rows_iterable() {
        let data = DataFile::from_toml_str(
            r#"
[[table]]
id = 1
name = "Foo"

[[table]]
id = 2
name = "Bar"
"#,
        )
        .unwrap();
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["table"]);
        let ctx = RenderContext::new(String::new(), BTreeMap::new(), Arc::new(data));

        let out = render(
            "{% for row in data.table %}<tr><td>{{ row.id }}</td><td>{{ row.name }}</td></tr>{% endfor %}",
            &ctx,
        )
        .unwrap();

        assert_eq!(
            out,
            "<tr><td>1</td><td>Foo</td></tr><tr><td>2</td><td>Bar</td></tr>"
        );
    }
}
