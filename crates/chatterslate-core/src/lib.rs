mod core;
mod engine;
mod error;
mod node_type;
mod ops;
mod plugin;
mod query;
mod serde_value;
mod strategy;
mod template;

pub use crate::core::*;
pub use crate::engine::*;
pub use crate::error::*;
pub use crate::node_type::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::query::*;
pub use crate::serde_value::*;
pub use crate::strategy::*;
pub use crate::template::*;
