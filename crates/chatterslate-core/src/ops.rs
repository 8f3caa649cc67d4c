use serde::{Deserialize, Serialize};

use crate::core::{Data, Mark, Node};
use crate::node_type::{ListType, NodeType};

/// One mutation primitive. Block primitives act on the selected blocks,
/// insert primitives act at the selection cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    SetBlock {
        kind: NodeType,
    },
    WrapBlock {
        kind: NodeType,
    },
    UnwrapBlock {
        kind: NodeType,
    },
    InsertInline {
        kind: NodeType,
        #[serde(default)]
        data: Data,
        #[serde(default)]
        is_void: bool,
    },
    InsertBlock {
        node: Node,
    },
    InsertText {
        text: String,
    },
    AddMark {
        mark: Mark,
    },
    RemoveMark {
        kind: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// An ordered batch of primitives, applied left to right, each seeing the
/// result of the previous one.
///
/// Strategies build transactions only through the named constructors below,
/// one per decision branch, so the order inside each branch is fixed in a
/// single place. In particular [`Transaction::switch_list`] always unwraps
/// the stale container before wrapping in the new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    ops: Vec<Op>,
    #[serde(default)]
    meta: TransactionMeta,
}

impl Transaction {
    /// Free-form batch, for plugins and callers outside the built-in
    /// strategies.
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            meta: TransactionMeta::default(),
        }
    }

    pub fn set_block(kind: NodeType) -> Self {
        Self::new(vec![Op::SetBlock { kind }])
    }

    /// Retypes the selection and lifts it out of every list flavor.
    pub fn exit_list(kind: NodeType) -> Self {
        Self::new(vec![
            Op::SetBlock { kind },
            Op::UnwrapBlock {
                kind: NodeType::BulletedList,
            },
            Op::UnwrapBlock {
                kind: NodeType::NumberedList,
            },
        ])
    }

    /// Swaps the container flavor of list items that stay list items.
    pub fn switch_list(target: ListType) -> Self {
        Self::new(vec![
            Op::UnwrapBlock {
                kind: target.other().node_type(),
            },
            Op::WrapBlock {
                kind: target.node_type(),
            },
        ])
    }

    pub fn enter_list(target: ListType) -> Self {
        Self::new(vec![
            Op::SetBlock {
                kind: NodeType::ListItem,
            },
            Op::WrapBlock {
                kind: target.node_type(),
            },
        ])
    }

    pub fn insert_void(kind: NodeType, data: Data) -> Self {
        Self::new(vec![Op::InsertInline {
            kind,
            data,
            is_void: true,
        }])
    }

    pub fn insert_block(node: Node) -> Self {
        Self::new(vec![Op::InsertBlock { node }])
    }

    pub fn insert_text(text: impl Into<String>) -> Self {
        Self::new(vec![Op::InsertText { text: text.into() }])
    }

    pub fn add_mark(mark: Mark) -> Self {
        Self::new(vec![Op::AddMark { mark }])
    }

    pub fn remove_mark(kind: impl Into<String>) -> Self {
        Self::new(vec![Op::RemoveMark { kind: kind.into() }])
    }

    /// Drops marks of the same type, then adds `mark`.
    pub fn replace_mark(mark: Mark) -> Self {
        Self::new(vec![
            Op::RemoveMark {
                kind: mark.kind.clone(),
            },
            Op::AddMark { mark },
        ])
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn meta(&self) -> &TransactionMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_list_unwraps_before_wrapping() {
        let tx = Transaction::switch_list(ListType::NumberedList);
        assert_eq!(
            tx.ops(),
            &[
                Op::UnwrapBlock {
                    kind: NodeType::BulletedList
                },
                Op::WrapBlock {
                    kind: NodeType::NumberedList
                },
            ]
        );
    }

    #[test]
    fn ops_serialize_with_op_tag() {
        let tx = Transaction::set_block(NodeType::BlockQuote).source("test");
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ops": [{ "op": "set_block", "kind": "block-quote" }],
                "meta": { "source": "test" },
            })
        );
    }
}
