use std::fmt;

use serde::{Deserialize, Serialize};

/// Type tag of a block or inline element.
///
/// Built-in types are closed variants so strategies never compare raw
/// strings. Anything else (registered by a plugin) round-trips through
/// `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Paragraph,
    BlockQuote,
    HeadingOne,
    HeadingTwo,
    ListItem,
    BulletedList,
    NumberedList,
    Table,
    TableRow,
    TableCell,
    HorizontalRule,
    Underbar,
    UnderbarL,
    UnderbarXl,
    Custom(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Paragraph => "paragraph",
            NodeType::BlockQuote => "block-quote",
            NodeType::HeadingOne => "heading-one",
            NodeType::HeadingTwo => "heading-two",
            NodeType::ListItem => "list-item",
            NodeType::BulletedList => "bulleted-list",
            NodeType::NumberedList => "numbered-list",
            NodeType::Table => "table",
            NodeType::TableRow => "table_row",
            NodeType::TableCell => "table_cell",
            NodeType::HorizontalRule => "horizontal-rule",
            NodeType::Underbar => "underbar",
            NodeType::UnderbarL => "underbar_l",
            NodeType::UnderbarXl => "underbar_xl",
            NodeType::Custom(name) => name,
        }
    }

    pub fn is_list_container(&self) -> bool {
        matches!(self, NodeType::BulletedList | NodeType::NumberedList)
    }
}

impl From<&str> for NodeType {
    fn from(value: &str) -> Self {
        match value {
            "paragraph" => NodeType::Paragraph,
            "block-quote" => NodeType::BlockQuote,
            "heading-one" => NodeType::HeadingOne,
            "heading-two" => NodeType::HeadingTwo,
            "list-item" => NodeType::ListItem,
            "bulleted-list" => NodeType::BulletedList,
            "numbered-list" => NodeType::NumberedList,
            "table" => NodeType::Table,
            "table_row" => NodeType::TableRow,
            "table_cell" => NodeType::TableCell,
            "horizontal-rule" => NodeType::HorizontalRule,
            "underbar" => NodeType::Underbar,
            "underbar_l" => NodeType::UnderbarL,
            "underbar_xl" => NodeType::UnderbarXl,
            other => NodeType::Custom(other.to_string()),
        }
    }
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        match NodeType::from(value.as_str()) {
            NodeType::Custom(_) => NodeType::Custom(value),
            known => known,
        }
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two list container flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListType {
    BulletedList,
    NumberedList,
}

impl ListType {
    pub fn node_type(self) -> NodeType {
        match self {
            ListType::BulletedList => NodeType::BulletedList,
            ListType::NumberedList => NodeType::NumberedList,
        }
    }

    pub fn other(self) -> ListType {
        match self {
            ListType::BulletedList => ListType::NumberedList,
            ListType::NumberedList => ListType::BulletedList,
        }
    }

    pub fn from_node_type(kind: &NodeType) -> Option<ListType> {
        match kind {
            NodeType::BulletedList => Some(ListType::BulletedList),
            NodeType::NumberedList => Some(ListType::NumberedList),
            _ => None,
        }
    }
}
