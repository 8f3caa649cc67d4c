use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Data, Editor};
use crate::error::{CommandError, QueryError, RegistryError};
use crate::node_type::{ListType, NodeType};
use crate::ops::Transaction;
use crate::query::{active_marks, has_block, has_mark, is_inside_type};
use crate::strategy::{
    color_strategy, mark_strategy, plain_strategy, table_strategy, toggle_block, void_strategy,
};
use crate::template::{TemplateBuilder, TemplateRegistry};

pub type CommandHandler =
    Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>;
pub type QueryHandler = Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub args_example: Option<Value>,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            args_example: None,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: QueryHandler,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

/// How a node type renders: one element tag plus fixed attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: NodeType,
    pub role: NodeRole,
    pub is_void: bool,
    pub tag: String,
    #[serde(default)]
    pub attributes: Data,
}

impl NodeSpec {
    pub fn block(kind: NodeType, tag: impl Into<String>) -> Self {
        Self {
            kind,
            role: NodeRole::Block,
            is_void: false,
            tag: tag.into(),
            attributes: Data::default(),
        }
    }

    pub fn void_inline(kind: NodeType, tag: impl Into<String>, attributes: Data) -> Self {
        Self {
            kind,
            role: NodeRole::Inline,
            is_void: true,
            tag: tag.into(),
            attributes,
        }
    }
}

pub trait EditorPlugin: Send + Sync {
    fn id(&self) -> &str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
    fn templates(&self) -> Vec<(String, TemplateBuilder)> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<NodeType, NodeSpec>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
    templates: TemplateRegistry,
}

impl PluginRegistry {
    pub fn new(
        plugins: impl IntoIterator<Item = Box<dyn EditorPlugin>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    /// The toolbar set of the chatter editor.
    pub fn chatter() -> Self {
        let plugins: Vec<Box<dyn EditorPlugin>> = vec![
            Box::new(ParagraphPlugin),
            Box::new(MarkPlugin::new("bold", "strong")),
            Box::new(MarkPlugin::new("italic", "em")),
            Box::new(MarkPlugin::new("underline", "u")),
            Box::new(BlockPlugin::new(NodeType::BlockQuote, "blockquote")),
            Box::new(BlockPlugin::new(NodeType::NumberedList, "ol")),
            Box::new(BlockPlugin::new(NodeType::BulletedList, "ul")),
            Box::new(BlockPlugin::render_only(NodeType::ListItem, "li")),
            Box::new(BlockPlugin::new(NodeType::HeadingOne, "h1")),
            Box::new(BlockPlugin::new(NodeType::HeadingTwo, "h2")),
            Box::new(VoidPlugin::new(NodeType::HorizontalRule, "hr")),
            Box::new(VoidPlugin::with_class(NodeType::Underbar, "span", "underbar")),
            Box::new(VoidPlugin::with_class(NodeType::UnderbarL, "span", "underbar_l")),
            Box::new(VoidPlugin::with_class(NodeType::UnderbarXl, "span", "underbar_xl")),
            Box::new(ColorPlugin),
            Box::new(PlainPlugin),
            Box::new(TablePlugin),
        ];
        Self::new(plugins).expect("chatter registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn EditorPlugin>) -> Result<(), RegistryError> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(RegistryError::DuplicateNodeSpec(spec.kind.to_string()));
            }
            self.node_specs.insert(spec.kind.clone(), spec);
        }

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(RegistryError::DuplicateCommand(cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(RegistryError::DuplicateQuery(query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        for (name, builder) in plugin.templates() {
            self.templates.register(name, builder)?;
        }

        tracing::debug!(plugin = plugin.id(), "plugin registered");
        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<NodeType, NodeSpec> {
        &self.node_specs
    }

    pub fn node_spec(&self, kind: &NodeType) -> Option<&NodeSpec> {
        self.node_specs.get(kind)
    }

    pub fn is_known_kind(&self, kind: &NodeType) -> bool {
        self.node_specs.contains_key(kind)
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }
}

fn run(editor: &mut Editor, tx: Transaction) -> Result<(), CommandError> {
    editor.apply(tx).map_err(CommandError::from)
}

fn str_arg<'a>(command: &str, args: Option<&'a Value>, name: &str) -> Result<&'a str, CommandError> {
    args.and_then(|v| v.get(name))
        .and_then(Value::as_str)
        .ok_or_else(|| CommandError::InvalidArgs {
            command: command.to_string(),
            reason: format!("missing string args.{name}"),
        })
}

fn inside_table(editor: &Editor) -> bool {
    is_inside_type(editor.doc(), editor.selection(), &NodeType::Table)
}

struct ParagraphPlugin;

impl EditorPlugin for ParagraphPlugin {
    fn id(&self) -> &str {
        "paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block(NodeType::Paragraph, "p")]
    }
}

/// A block type with a toolbar toggle. List containers toggle through the
/// list strategy.
pub struct BlockPlugin {
    block: NodeType,
    tag: &'static str,
    toggle: bool,
}

impl BlockPlugin {
    pub fn new(block: NodeType, tag: &'static str) -> Self {
        Self {
            block,
            tag,
            toggle: true,
        }
    }

    /// Declares the node spec only, for types no button produces directly.
    pub fn render_only(block: NodeType, tag: &'static str) -> Self {
        Self {
            block,
            tag,
            toggle: false,
        }
    }
}

impl EditorPlugin for BlockPlugin {
    fn id(&self) -> &str {
        self.block.as_str()
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block(self.block.clone(), self.tag)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        if !self.toggle {
            return Vec::new();
        }
        let block = self.block.clone();
        let id = format!("{block}.toggle");
        let command = id.clone();
        vec![
            CommandSpec::new(id, format!("Toggle {block}"), move |editor, _args| {
                if inside_table(editor) {
                    return Err(CommandError::Disabled(command.clone()));
                }
                let tx = toggle_block(
                    editor.doc(),
                    editor.selection(),
                    &block,
                    &editor.config().default_block,
                )?;
                run(editor, tx)
            })
            .description("Toggle the block type of the selected blocks."),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        if !self.toggle {
            return Vec::new();
        }
        let block = self.block.clone();
        vec![
            QuerySpec::new(format!("{}.is_active", self.block), move |editor, _args| {
                let active = if ListType::from_node_type(&block).is_some() {
                    is_inside_type(editor.doc(), editor.selection(), &block)
                } else {
                    has_block(editor.doc(), editor.selection(), &block)
                };
                Ok(Value::Bool(active))
            }),
            QuerySpec::new(format!("{}.is_disabled", self.block), |editor, _args| {
                Ok(Value::Bool(inside_table(editor)))
            }),
        ]
    }
}

/// An atomic inline inserted at the cursor.
pub struct VoidPlugin {
    kind: NodeType,
    tag: &'static str,
    attributes: Data,
}

impl VoidPlugin {
    pub fn new(kind: NodeType, tag: &'static str) -> Self {
        Self {
            kind,
            tag,
            attributes: Data::default(),
        }
    }

    pub fn with_class(kind: NodeType, tag: &'static str, class_name: &str) -> Self {
        let mut plugin = Self::new(kind, tag);
        plugin
            .attributes
            .insert("className".to_string(), Value::from(class_name));
        plugin
    }
}

impl EditorPlugin for VoidPlugin {
    fn id(&self) -> &str {
        self.kind.as_str()
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void_inline(
            self.kind.clone(),
            self.tag,
            self.attributes.clone(),
        )]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        let kind = self.kind.clone();
        vec![
            CommandSpec::new(
                format!("{kind}.insert"),
                format!("Insert {kind}"),
                move |editor, args| {
                    let data: Data = match args.as_ref().and_then(|v| v.get("data")) {
                        Some(data) => serde_json::from_value(data.clone()).map_err(|err| {
                            CommandError::InvalidArgs {
                                command: format!("{kind}.insert"),
                                reason: err.to_string(),
                            }
                        })?,
                        None => Data::default(),
                    };
                    run(editor, void_strategy(kind.clone(), data))
                },
            )
            .description("Insert an atomic inline at the cursor."),
        ]
    }
}

pub struct MarkPlugin {
    mark: &'static str,
    tag: &'static str,
}

impl MarkPlugin {
    pub fn new(mark: &'static str, tag: &'static str) -> Self {
        Self { mark, tag }
    }
}

impl EditorPlugin for MarkPlugin {
    fn id(&self) -> &str {
        self.mark
    }

    fn commands(&self) -> Vec<CommandSpec> {
        let mark = self.mark;
        vec![
            CommandSpec::new(
                format!("{mark}.toggle"),
                format!("Toggle {mark}"),
                move |editor, _args| {
                    let tx = mark_strategy(editor.doc(), editor.selection(), mark);
                    run(editor, tx)
                },
            )
            .description(format!("Toggle the {mark} mark (<{}>) on the selection.", self.tag)),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        let mark = self.mark;
        vec![QuerySpec::new(
            format!("{mark}.is_active"),
            move |editor, _args| Ok(Value::Bool(has_mark(editor.doc(), editor.selection(), mark))),
        )]
    }
}

struct ColorPlugin;

impl EditorPlugin for ColorPlugin {
    fn id(&self) -> &str {
        "color"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("color.set", "Set font color", |editor, args| {
                let color = str_arg("color.set", args.as_ref(), "color")?;
                run(editor, color_strategy(color))
            })
            .description("Replace the font color of the selection.")
            .args_example(serde_json::json!({ "color": "red" })),
            CommandSpec::new("color.unset", "Clear font color", |editor, _args| {
                run(
                    editor,
                    Transaction::remove_mark("color").source("command:color.unset"),
                )
            }),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("color.active", |editor, _args| {
            Ok(active_marks(editor.doc(), editor.selection())
                .into_iter()
                .find(|m| m.kind == "color")
                .and_then(|m| m.data.get("color").cloned())
                .unwrap_or(Value::Null))
        })]
    }
}

/// Inserts literal characters, such as arrows and quotes, at the cursor.
struct PlainPlugin;

impl EditorPlugin for PlainPlugin {
    fn id(&self) -> &str {
        "plain"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("plain.insert", "Insert character", |editor, args| {
                let text = str_arg("plain.insert", args.as_ref(), "text")?;
                run(editor, plain_strategy(text))
            })
            .args_example(serde_json::json!({ "text": "→" })),
        ]
    }
}

struct TablePlugin;

impl EditorPlugin for TablePlugin {
    fn id(&self) -> &str {
        "table"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::block(NodeType::Table, "table"),
            NodeSpec::block(NodeType::TableRow, "tr"),
            NodeSpec::block(NodeType::TableCell, "td"),
        ]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("table.insert", "Insert table", |editor, args| {
                let name = str_arg("table.insert", args.as_ref(), "template")?;
                let tx = table_strategy(editor.registry().templates(), name)?;
                run(editor, tx)
            })
            .description("Insert a named table template at the cursor.")
            .args_example(serde_json::json!({ "template": "arrow" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("table.is_inside", |editor, _args| {
                Ok(Value::Bool(inside_table(editor)))
            }),
            QuerySpec::new("table.templates", |editor, _args| {
                Ok(Value::from(editor.registry().templates().names()))
            }),
        ]
    }

    fn templates(&self) -> Vec<(String, TemplateBuilder)> {
        let builtin = TemplateRegistry::builtin();
        builtin
            .names()
            .into_iter()
            .filter_map(|name| Some((name.to_string(), builtin.builder(name)?)))
            .collect()
    }
}
