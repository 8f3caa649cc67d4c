use thiserror::Error;

use crate::core::Key;

/// Rejection of a whole transaction by the document engine. The state the
/// transaction was applied to is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("Unknown node key: {0}")]
    UnknownKey(Key),

    #[error("Node {0} is not a block")]
    NotABlock(Key),

    #[error("Node {0} is not a text node")]
    NotAText(Key),

    #[error("Operation needs a cursor but the selection has none")]
    MissingCursor,

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
}

/// Failure of a strategy to decide a transaction. No operation is emitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("Unknown template: {name}")]
    InvalidTemplate { name: String },

    #[error("Template {name} builds a malformed subtree: {reason}")]
    MalformedTemplate { name: String, reason: String },

    #[error("Malformed tree at node {key}: {reason}")]
    MalformedTree { key: Key, reason: String },

    #[error("{0} is a list container, use the list strategy")]
    ListType(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid arguments for {command}: {reason}")]
    InvalidArgs { command: String, reason: String },

    #[error("Command {0} is disabled for the current selection")]
    Disabled(String),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("Failed to apply transaction: {0}")]
    Apply(#[from] ApplyError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    #[error("Invalid arguments for {query}: {reason}")]
    InvalidArgs { query: String, reason: String },

    #[error("Failed to decode query result: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Duplicate node spec kind: {0}")]
    DuplicateNodeSpec(String),

    #[error("Duplicate command id: {0}")]
    DuplicateCommand(String),

    #[error("Duplicate query id: {0}")]
    DuplicateQuery(String),

    #[error("Duplicate template name: {0}")]
    DuplicateTemplate(String),
}
