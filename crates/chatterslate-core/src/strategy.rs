//! Decision procedures for formatting commands.
//!
//! Each strategy is a pure function of the document, the selection and the
//! command parameters. It only decides which transaction to run; applying it
//! is the engine's job.

use crate::core::{Data, Document, Mark, Selection};
use crate::error::StrategyError;
use crate::node_type::{ListType, NodeType};
use crate::ops::Transaction;
use crate::query::{check_list_items, has_block, has_mark, is_in_list, is_inside_type};
use crate::template::TemplateRegistry;

/// Entry point for a block button: list containers go to
/// [`list_strategy`], every other type to [`block_strategy`].
pub fn toggle_block(
    doc: &Document,
    selection: &Selection,
    target: &NodeType,
    default: &NodeType,
) -> Result<Transaction, StrategyError> {
    match ListType::from_node_type(target) {
        Some(list) => list_strategy(doc, selection, list, default),
        None => block_strategy(doc, selection, target, default),
    }
}

/// Toggles a non-list block type. Inside a list the toggle also flattens
/// the list, whichever way it goes.
pub fn block_strategy(
    doc: &Document,
    selection: &Selection,
    target: &NodeType,
    default: &NodeType,
) -> Result<Transaction, StrategyError> {
    if target.is_list_container() {
        return Err(StrategyError::ListType(target.to_string()));
    }

    let is_active = has_block(doc, selection, target);
    let in_list = is_in_list(doc, selection);
    tracing::trace!(kind = %target, is_active, in_list, "block toggle");

    let kind = if is_active {
        default.clone()
    } else {
        target.clone()
    };
    let tx = if in_list {
        Transaction::exit_list(kind)
    } else {
        Transaction::set_block(kind)
    };
    Ok(tx.source(format!("command:{target}.toggle")))
}

/// Toggles a list flavor. Whether the selection is already in a list of
/// that flavor is read from the containers, since list items carry no
/// flavor themselves.
pub fn list_strategy(
    doc: &Document,
    selection: &Selection,
    target: ListType,
    default: &NodeType,
) -> Result<Transaction, StrategyError> {
    check_list_items(doc, selection).map_err(|key| StrategyError::MalformedTree {
        key,
        reason: "list-item has no list container ancestor".to_string(),
    })?;

    let in_list = is_in_list(doc, selection);
    let in_target = is_inside_type(doc, selection, &target.node_type());
    tracing::trace!(list = ?target, in_list, in_target, "list toggle");

    let tx = match (in_list, in_target) {
        (true, true) => Transaction::exit_list(default.clone()),
        (true, false) => Transaction::switch_list(target),
        (false, _) => Transaction::enter_list(target),
    };
    Ok(tx.source(format!("command:{}.toggle", target.node_type())))
}

/// Inserts one atomic node at the cursor. Every call adds a new node.
pub fn void_strategy(kind: NodeType, data: Data) -> Transaction {
    let source = format!("command:{kind}.insert");
    Transaction::insert_void(kind, data).source(source)
}

/// Inserts the named template at the cursor. An unknown name fails before
/// any operation exists.
pub fn table_strategy(
    templates: &TemplateRegistry,
    name: &str,
) -> Result<Transaction, StrategyError> {
    let node = templates.build(name)?;
    Ok(Transaction::insert_block(node).source(format!("command:table.insert:{name}")))
}

/// Adds the mark unless every selected leaf already carries it, in which
/// case it is removed.
pub fn mark_strategy(doc: &Document, selection: &Selection, kind: &str) -> Transaction {
    let tx = if has_mark(doc, selection, kind) {
        Transaction::remove_mark(kind)
    } else {
        Transaction::add_mark(Mark::new(kind))
    };
    tx.source(format!("command:{kind}.toggle"))
}

pub fn color_strategy(color: &str) -> Transaction {
    Transaction::replace_mark(Mark::new("color").with_data("color", color))
        .source("command:color.set")
}

pub fn plain_strategy(text: &str) -> Transaction {
    Transaction::insert_text(text).source("command:plain.insert")
}
