//! Read-only predicates over a document and a selection.
//!
//! All of these are total: a selected key that is not in the document simply
//! never matches.

use crate::core::{Document, Element, Key, Mark, Node, Selection};
use crate::node_type::NodeType;

/// True iff any selected block is of type `target`.
pub fn has_block(doc: &Document, selection: &Selection, target: &NodeType) -> bool {
    selection
        .blocks
        .iter()
        .filter_map(|&key| doc.find(key))
        .any(|node| node.kind() == Some(target))
}

/// True iff a strict ancestor of some selected block is of type `ancestor`.
pub fn is_inside_type(doc: &Document, selection: &Selection, ancestor: &NodeType) -> bool {
    selection
        .blocks
        .iter()
        .any(|&key| closest(doc, key, |el| el.kind == *ancestor).is_some())
}

/// Nearest strict ancestor of `key` matching `predicate`.
pub fn closest<'a>(
    doc: &'a Document,
    key: Key,
    predicate: impl Fn(&Element) -> bool,
) -> Option<&'a Element> {
    doc.ancestors(key)?
        .into_iter()
        .rev()
        .find(|el| predicate(el))
}

/// A selected block is a list item or sits inside one.
pub fn is_in_list(doc: &Document, selection: &Selection) -> bool {
    has_block(doc, selection, &NodeType::ListItem)
        || is_inside_type(doc, selection, &NodeType::ListItem)
}

/// Every list item covering the selection has a list container above it.
/// `Err` carries the key of the first item that does not.
pub fn check_list_items(doc: &Document, selection: &Selection) -> Result<(), Key> {
    for &key in &selection.blocks {
        let Some(node) = doc.find(key) else {
            continue;
        };
        let item = if node.kind() == Some(&NodeType::ListItem) {
            Some(key)
        } else {
            closest(doc, key, |el| el.kind == NodeType::ListItem).map(|el| el.key)
        };
        let Some(item) = item else {
            continue;
        };
        if closest(doc, item, |el| el.kind.is_list_container()).is_none() {
            return Err(item);
        }
    }
    Ok(())
}

/// Marks carried by every leaf of every selected block.
pub fn active_marks(doc: &Document, selection: &Selection) -> Vec<Mark> {
    fn collect<'a>(node: &'a Node, out: &mut Vec<&'a [Mark]>) {
        match node {
            Node::Text(t) => out.extend(t.leaves.iter().map(|l| l.marks.as_slice())),
            Node::Block(el) | Node::Inline(el) => {
                el.children.iter().for_each(|child| collect(child, out));
            }
        }
    }

    let mut leaves = Vec::new();
    for node in selection.blocks.iter().filter_map(|&key| doc.find(key)) {
        collect(node, &mut leaves);
    }

    let Some((first, rest)) = leaves.split_first() else {
        return Vec::new();
    };
    first
        .iter()
        .filter(|mark| rest.iter().all(|marks| marks.contains(mark)))
        .cloned()
        .collect()
}

pub fn has_mark(doc: &Document, selection: &Selection, kind: &str) -> bool {
    active_marks(doc, selection).iter().any(|m| m.kind == kind)
}
