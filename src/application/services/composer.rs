//! Composition engine
//!
//! Rewrites a document in post-order: children first, left to right, then the
//! node itself. A node whose tag names a registered component is replaced by
//! the single node extracted from that component's rendered output.
//!
//! Expansion output is not scanned again. Component-shaped tags emitted by a
//! template reach serialization as plain HTML.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::application::context::{RenderContext, SharedData};
use crate::application::services::registry::{ComponentDefinition, TemplateRegistry};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{extract_body_root, Document, ExtractionPolicy, NodeId};
use crate::infrastructure::html;

/// Knobs for one composition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeOptions {
    pub extraction: ExtractionPolicy,
    /// Reuse template output for repeated (component, attributes, content)
    /// triples within one render. Only valid for side-effect-free templates.
    pub memoize: bool,
}

/// Composition engine bound to a registry and a shared data handle.
pub struct Composer<'r> {
    registry: &'r TemplateRegistry,
    data: Arc<dyn SharedData>,
    options: ComposeOptions,
}

type OutputKey = (String, BTreeMap<String, String>, String);

impl<'r> Composer<'r> {
    pub fn new(registry: &'r TemplateRegistry, data: Arc<dyn SharedData>) -> Self {
        Self {
            registry,
            data,
            options: ComposeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    /// Rewrite the subtree at `root` in place and return the node that now
    /// stands for it (`root` itself unless `root` was a component).
    ///
    /// Any template or extraction failure aborts the whole render.
    #[instrument(level = "debug", skip(self, document))]
    pub fn render(&self, document: &mut Document, root: NodeId) -> ApplicationResult<NodeId> {
        let mut pass = RenderPass {
            composer: self,
            document,
            outputs: HashMap::new(),
            expansions: 0,
        };
        let rendered = pass.render_node(root)?;
        debug!("render finished: {} expansion(s)", pass.expansions);
        Ok(rendered)
    }
}

/// State of one `Composer::render` call.
struct RenderPass<'c, 'r, 'd> {
    composer: &'c Composer<'r>,
    document: &'d mut Document,
    outputs: HashMap<OutputKey, String>,
    expansions: usize,
}

impl<'c, 'r, 'd> RenderPass<'c, 'r, 'd> {
    fn render_node(&mut self, id: NodeId) -> ApplicationResult<NodeId> {
        let mut position = 0;
        while let Some(child) = self.document.children(id).get(position).copied() {
            let rendered = self.render_node(child)?;
            if rendered != child {
                self.document.replace_child(id, child, rendered)?;
                self.document.remove_subtree(child);
            }
            position += 1;
        }

        let registry: &'r TemplateRegistry = self.composer.registry;
        let Some(name) = self.document.local_name(id) else {
            return Ok(id);
        };
        let Some(definition) = registry.lookup(name) else {
            trace!("passthrough <{}>", name);
            return Ok(id);
        };
        self.expand(id, definition)
    }

    fn expand(&mut self, id: NodeId, definition: &ComponentDefinition) -> ApplicationResult<NodeId> {
        debug!("expanding <{}>", definition.name);
        let attributes = self.document.attributes(id);
        let content = self.take_content(id)?;
        let context = RenderContext::new(content, attributes, Arc::clone(&self.composer.data));
        let output = self.execute(definition, context)?;

        let scratch = self.document.create_container();
        html::parse_str_into(self.document, scratch, &output);
        let extracted = extract_body_root(self.document, scratch, self.composer.options.extraction);
        let result = match extracted {
            Ok(node) => {
                self.document.detach(node);
                self.expansions += 1;
                Ok(node)
            }
            Err(source) => Err(ApplicationError::StructuralExtraction {
                component: definition.name.clone(),
                source,
            }),
        };
        self.document.remove_subtree(scratch);
        result
    }

    /// Move the node's children out and serialize them. Empty for childless
    /// nodes, without serializing an empty container.
    fn take_content(&mut self, id: NodeId) -> ApplicationResult<String> {
        if self.document.children(id).is_empty() {
            return Ok(String::new());
        }
        let container = self.document.create_container();
        self.document.reparent_children(id, container)?;
        let content = html::children_to_string(self.document, container);
        self.document.remove_subtree(container);
        content.map_err(|source| ApplicationError::Serialize {
            context: "component content".to_string(),
            source,
        })
    }

    fn execute(
        &mut self,
        definition: &ComponentDefinition,
        context: RenderContext,
    ) -> ApplicationResult<String> {
        let key = self.composer.options.memoize.then(|| {
            (
                definition.name.clone(),
                context.attributes.clone(),
                context.content.clone(),
            )
        });
        if let Some(output) = key.as_ref().and_then(|key| self.outputs.get(key)) {
            trace!("reusing output for <{}>", definition.name);
            return Ok(output.clone());
        }

        let output = self
            .composer
            .registry
            .execute(definition, &context)
            .map_err(|source| ApplicationError::TemplateExecution {
                component: definition.name.clone(),
                source,
            })?;
        if let Some(key) = key {
            self.outputs.insert(key, output.clone());
        }
        Ok(output)
    }
}
