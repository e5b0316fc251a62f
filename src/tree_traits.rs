//! Outline rendering of arena documents via termtree

use termtree::Tree;
use tracing::instrument;

use crate::domain::{Document, NodeData, NodeId};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

/// Outline of a document: one line per node, whitespace-only text omitted.
impl TreeNodeConvert for Document {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        fn build_tree(document: &Document, id: NodeId) -> Tree<String> {
            let label = document
                .data(id)
                .map(|data| data.to_string())
                .unwrap_or_default();
            let leaves = document
                .children(id)
                .iter()
                .copied()
                .filter(|&child| !is_blank_text(document, child))
                .map(|child| build_tree(document, child));
            Tree::new(label).with_leaves(leaves)
        }

        build_tree(self, self.root())
    }
}

fn is_blank_text(document: &Document, id: NodeId) -> bool {
    matches!(
        document.data(id),
        Some(NodeData::Text { contents }) if contents.trim().is_empty()
    )
}
