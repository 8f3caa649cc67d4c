use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine;
use crate::error::{ApplyError, CommandError, QueryError};
use crate::node_type::NodeType;
use crate::ops::Transaction;
use crate::plugin::PluginRegistry;

pub type Data = BTreeMap<String, Value>;
pub type Path = Vec<usize>;

/// Stable node identifier, unique within one document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Key(pub u64);

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Block(Element),
    Inline(Element),
    Text(Text),
}

impl Node {
    pub fn block(kind: impl Into<NodeType>, children: Vec<Node>) -> Self {
        Node::Block(Element::new(kind).with_children(children))
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::block(NodeType::Paragraph, vec![Node::text(text)])
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(Text::new(text))
    }

    pub fn void_inline(kind: impl Into<NodeType>, data: Data) -> Self {
        Node::Inline(Element {
            key: Key::default(),
            kind: kind.into(),
            data,
            is_void: true,
            children: Vec::new(),
        })
    }

    pub fn key(&self) -> Key {
        match self {
            Node::Block(el) | Node::Inline(el) => el.key,
            Node::Text(t) => t.key,
        }
    }

    fn set_key(&mut self, key: Key) {
        match self {
            Node::Block(el) | Node::Inline(el) => el.key = key,
            Node::Text(t) => t.key = key,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Block(el) | Node::Inline(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_block(&self) -> Option<&Element> {
        match self {
            Node::Block(el) => Some(el),
            Node::Inline(_) | Node::Text(_) => None,
        }
    }

    pub fn kind(&self) -> Option<&NodeType> {
        self.as_element().map(|el| &el.kind)
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Block(el) | Node::Inline(el) => &el.children,
            Node::Text(_) => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Block(el) | Node::Inline(el) => Some(&mut el.children),
            Node::Text(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            Node::Text(t) => t.text(),
            Node::Block(el) | Node::Inline(el) => el.text(),
        }
    }

    /// Length used for cursor positioning: text length, or 1 for a void.
    pub(crate) fn offset_len(&self) -> usize {
        match self {
            Node::Text(t) => t.len(),
            Node::Block(el) | Node::Inline(el) if el.is_void => 1,
            Node::Block(el) | Node::Inline(el) => el.children.iter().map(Node::offset_len).sum(),
        }
    }

    pub fn without_keys(&self) -> Node {
        let mut node = self.clone();
        clear_keys(&mut node);
        node
    }

    /// Structural equality ignoring node keys.
    pub fn same_shape(&self, other: &Node) -> bool {
        self.without_keys() == other.without_keys()
    }
}

fn clear_keys(node: &mut Node) {
    node.set_key(Key::default());
    if let Some(children) = node.children_mut() {
        children.iter_mut().for_each(clear_keys);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub key: Key,
    #[serde(rename = "type")]
    pub kind: NodeType,
    #[serde(default, skip_serializing_if = "Data::is_empty")]
    pub data: Data,
    #[serde(default, rename = "isVoid")]
    pub is_void: bool,
    #[serde(default, rename = "nodes")]
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(kind: impl Into<NodeType>) -> Self {
        Self {
            key: Key::default(),
            kind: kind.into(),
            data: Data::default(),
            is_void: false,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// A block whose children are text and inlines only.
    pub fn is_leaf_block(&self) -> bool {
        !self.children.iter().any(|n| matches!(n, Node::Block(_)))
    }

    pub fn text(&self) -> String {
        self.children.iter().map(Node::text_content).collect()
    }

    pub fn is_text_empty(&self) -> bool {
        self.children.iter().all(|n| match n {
            Node::Text(t) => t.is_empty(),
            Node::Block(el) | Node::Inline(el) => !el.is_void && el.is_text_empty(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    #[serde(default)]
    pub key: Key,
    #[serde(default)]
    pub leaves: Vec<Leaf>,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            key: Key::default(),
            leaves: vec![Leaf {
                text: text.into(),
                marks: Vec::new(),
            }],
        }
    }

    pub fn text(&self) -> String {
        self.leaves.iter().map(|l| l.text.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.leaves.iter().map(|l| l.text.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leaf index and in-leaf offset for a text offset. Offsets on a leaf
    /// boundary resolve to the end of the earlier leaf.
    fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        let mut remaining = offset;
        for (ix, leaf) in self.leaves.iter().enumerate() {
            if remaining <= leaf.text.len() {
                return Some((ix, clamp_to_char_boundary(&leaf.text, remaining)));
            }
            remaining -= leaf.text.len();
        }
        let last = self.leaves.len().checked_sub(1)?;
        Some((last, self.leaves[last].text.len()))
    }

    pub(crate) fn split_off(&mut self, offset: usize) -> Vec<Leaf> {
        let mut right = Vec::new();
        if let Some((ix, at)) = self.locate(offset) {
            let leaf = &mut self.leaves[ix];
            right.push(Leaf {
                text: leaf.text.split_off(at),
                marks: leaf.marks.clone(),
            });
            right.extend(self.leaves.drain(ix + 1..));
        }
        if self.leaves.is_empty() {
            self.leaves.push(Leaf::default());
        }
        if right.is_empty() {
            right.push(Leaf::default());
        }
        right
    }

    /// Inserts `text` at `offset` and returns the offset actually used.
    pub(crate) fn insert_str(&mut self, offset: usize, text: &str) -> usize {
        if self.leaves.is_empty() {
            self.leaves.push(Leaf::default());
        }
        let Some((ix, at)) = self.locate(offset) else {
            return 0;
        };
        self.leaves[ix].text.insert_str(at, text);
        self.leaves[..ix].iter().map(|l| l.text.len()).sum::<usize>() + at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub marks: Vec<Mark>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Data::is_empty")]
    pub data: Data,
}

impl Mark {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: Data::default(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "RawDocument")]
pub struct Document {
    #[serde(skip_serializing_if = "Data::is_empty")]
    pub data: Data,
    pub nodes: Vec<Node>,
    #[serde(skip)]
    next_key: u64,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    data: Data,
    #[serde(default)]
    nodes: Vec<Node>,
}

/// Stored keys are kept when they are unique and assigned. Otherwise the
/// whole tree is rekeyed. Either way new keys continue past the largest one.
impl From<RawDocument> for Document {
    fn from(raw: RawDocument) -> Self {
        let mut doc = Self {
            data: raw.data,
            nodes: raw.nodes,
            next_key: 0,
        };

        let mut keys = Vec::new();
        collect_keys(&doc.nodes, &mut keys);
        let count = keys.len();
        keys.sort_unstable();
        keys.dedup();
        if keys.len() == count && keys.first().is_none_or(|key| *key != Key::default()) {
            doc.next_key = keys.last().map_or(0, |key| key.0);
        } else {
            tracing::debug!(nodes = count, "stored keys unusable, rekeying document");
            doc.assign_keys();
        }
        doc
    }
}

fn collect_keys(nodes: &[Node], out: &mut Vec<Key>) {
    for node in nodes {
        out.push(node.key());
        collect_keys(node.children(), out);
    }
}

impl Document {
    /// Builds a document and assigns fresh keys to every node.
    pub fn new(nodes: Vec<Node>) -> Self {
        let mut doc = Self {
            data: Data::default(),
            nodes,
            next_key: 0,
        };
        doc.assign_keys();
        doc
    }

    pub fn assign_keys(&mut self) {
        self.next_key = 0;
        let mut nodes = std::mem::take(&mut self.nodes);
        for node in &mut nodes {
            self.rekey(node);
        }
        self.nodes = nodes;
    }

    pub(crate) fn alloc_key(&mut self) -> Key {
        self.next_key += 1;
        Key(self.next_key)
    }

    /// Gives `node` and all its descendants keys from this document.
    pub(crate) fn rekey(&mut self, node: &mut Node) {
        node.set_key(self.alloc_key());
        if let Some(children) = node.children_mut() {
            for child in children {
                self.rekey(child);
            }
        }
    }

    pub fn find(&self, key: Key) -> Option<&Node> {
        self.node_at(&self.path_of(key)?)
    }

    pub fn path_of(&self, key: Key) -> Option<Path> {
        fn walk(children: &[Node], key: Key, path: &mut Path) -> bool {
            for (ix, node) in children.iter().enumerate() {
                path.push(ix);
                if node.key() == key || walk(node.children(), key, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let mut path = Path::new();
        walk(&self.nodes, key, &mut path).then_some(path)
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (&last, parent) = path.split_last()?;
        self.children_at(parent)?.get(last)
    }

    pub(crate) fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (&last, parent) = path.split_last()?;
        self.children_at_mut(parent)?.get_mut(last)
    }

    pub fn children_at(&self, parent_path: &[usize]) -> Option<&[Node]> {
        let mut children = self.nodes.as_slice();
        for &ix in parent_path {
            children = match children.get(ix)? {
                Node::Block(el) | Node::Inline(el) => &el.children,
                Node::Text(_) => return None,
            };
        }
        Some(children)
    }

    pub(crate) fn children_at_mut(&mut self, parent_path: &[usize]) -> Option<&mut Vec<Node>> {
        let mut children = &mut self.nodes;
        for &ix in parent_path {
            children = children.get_mut(ix)?.children_mut()?;
        }
        Some(children)
    }

    /// Strict ancestors of `key`, outermost first.
    pub fn ancestors(&self, key: Key) -> Option<Vec<&Element>> {
        let path = self.path_of(key)?;
        let mut out = Vec::with_capacity(path.len());
        let mut children = self.nodes.as_slice();
        for &ix in &path[..path.len() - 1] {
            let el = children.get(ix)?.as_element()?;
            out.push(el);
            children = &el.children;
        }
        Some(out)
    }

    pub fn leaf_blocks(&self) -> Vec<&Element> {
        fn walk<'a>(children: &'a [Node], out: &mut Vec<&'a Element>) {
            for node in children {
                if let Node::Block(el) = node {
                    if el.is_leaf_block() {
                        out.push(el);
                    } else {
                        walk(&el.children, out);
                    }
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }

    pub fn start_of(&self, block: Key) -> Option<Point> {
        let node = self.find(block)?;
        let key = first_text(node.children())?;
        Some(Point::new(key, 0))
    }

    pub fn end_of(&self, block: Key) -> Option<Point> {
        let node = self.find(block)?;
        let key = last_text(node.children())?;
        let len = match self.find(key)? {
            Node::Text(t) => t.len(),
            _ => 0,
        };
        Some(Point::new(key, len))
    }

    pub fn same_shape(&self, other: &Document) -> bool {
        self.data == other.data
            && self.nodes.len() == other.nodes.len()
            && self
                .nodes
                .iter()
                .zip(&other.nodes)
                .all(|(a, b)| a.same_shape(b))
    }
}

pub(crate) fn first_text(children: &[Node]) -> Option<Key> {
    children.iter().find_map(|node| match node {
        Node::Text(t) => Some(t.key),
        Node::Block(el) | Node::Inline(el) => first_text(&el.children),
    })
}

fn last_text(children: &[Node]) -> Option<Key> {
    children.iter().rev().find_map(|node| match node {
        Node::Text(t) => Some(t.key),
        Node::Block(el) | Node::Inline(el) => last_text(&el.children),
    })
}

/// A text position: a text node and a byte offset into its leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub key: Key,
    pub offset: usize,
}

impl Point {
    pub fn new(key: Key, offset: usize) -> Self {
        Self { key, offset }
    }
}

/// The blocks currently selected, in document order, plus the cursor used
/// by insertions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub blocks: Vec<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Point>,
}

impl Selection {
    pub fn blocks(blocks: impl IntoIterator<Item = Key>) -> Self {
        Self {
            blocks: blocks.into_iter().collect(),
            cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: Point) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// One block selected with the cursor at its end.
    pub fn end_of(doc: &Document, block: Key) -> Option<Self> {
        Some(Self::blocks([block]).with_cursor(doc.end_of(block)?))
    }

    /// One block selected with the cursor at its start.
    pub fn start_of(doc: &Document, block: Key) -> Option<Self> {
        Some(Self::blocks([block]).with_cursor(doc.start_of(block)?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorState {
    pub document: Document,
    #[serde(default)]
    pub selection: Selection,
}

impl EditorState {
    pub fn new(document: Document, selection: Selection) -> Self {
        Self {
            document,
            selection,
        }
    }
}

fn default_block() -> NodeType {
    NodeType::Paragraph
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub max_undo: usize,
    /// Block type a toggled-off block falls back to.
    #[serde(default = "default_block")]
    pub default_block: NodeType,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo: 0,
            default_block: default_block(),
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::with_defaults)
    }

    pub fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        self
    }
}

/// An editing session. Owns the current value exclusively; every applied
/// transaction replaces it and keeps the previous one for undo.
pub struct Editor {
    state: EditorState,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<EditorState>,
    redo_stack: Vec<EditorState>,
}

impl Editor {
    pub fn new(state: EditorState, registry: PluginRegistry) -> Self {
        Self::with_config(state, registry, EditorConfig::default())
    }

    pub fn with_config(state: EditorState, registry: PluginRegistry, config: EditorConfig) -> Self {
        Self {
            state,
            registry,
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    /// Empty paragraph, cursor inside it, chatter plugin set.
    pub fn with_chatter_plugins() -> Self {
        let document = Document::new(vec![Node::paragraph("")]);
        let selection = document
            .nodes
            .first()
            .and_then(|node| Selection::start_of(&document, node.key()))
            .unwrap_or_default();
        Self::new(
            EditorState::new(document, selection),
            PluginRegistry::chatter(),
        )
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn doc(&self) -> &Document {
        &self.state.document
    }

    pub fn selection(&self) -> &Selection {
        &self.state.selection
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), ApplyError> {
        engine::check_selection(&self.state.document, &selection)?;
        self.state.selection = selection;
        Ok(())
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.state, previous);
        self.redo_stack.push(current);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.state, next);
        self.undo_stack.push(current);
        true
    }

    /// Applies `tx` atomically. On error the current value is unchanged.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        if tx.is_empty() {
            return Ok(());
        }
        let source = tx.meta().source.as_deref().unwrap_or("-");

        let next = match engine::apply(&self.state, &tx) {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(source, %err, "transaction rejected");
                return Err(err);
            }
        };

        let previous = std::mem::replace(&mut self.state, next);
        self.undo_stack.push(previous);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }

        tracing::debug!(source, ops = tx.len(), "transaction applied");
        Ok(())
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::UnknownCommand(id.to_string()));
        };
        tracing::debug!(command = id, "running command");
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::UnknownQuery(id.to_string()));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value).map_err(|err| QueryError::Decode(err.to_string()))
    }
}
