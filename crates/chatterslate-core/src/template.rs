use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{Element, Node};
use crate::engine;
use crate::error::{RegistryError, StrategyError};
use crate::node_type::NodeType;

pub type TemplateBuilder = Arc<dyn Fn() -> Node + Send + Sync>;

/// Named builders of detached subtrees, such as table skeletons.
#[derive(Clone, Default)]
pub struct TemplateRegistry {
    builders: HashMap<String, TemplateBuilder>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `arrow`, `conversation` and `middle` tables.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, fn() -> Node); 3] = [
            ("arrow", arrow_table),
            ("conversation", conversation_table),
            ("middle", middle_table),
        ];
        for (name, builder) in builtins {
            registry.builders.insert(name.to_string(), Arc::new(builder));
        }
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        builder: TemplateBuilder,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.builders.contains_key(&name) {
            return Err(RegistryError::DuplicateTemplate(name));
        }
        self.builders.insert(name, builder);
        Ok(())
    }

    pub fn builder(&self, name: &str) -> Option<TemplateBuilder> {
        self.builders.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Builds the whole subtree and checks it before handing it out.
    pub fn build(&self, name: &str) -> Result<Node, StrategyError> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| StrategyError::InvalidTemplate {
                name: name.to_string(),
            })?;
        let node = builder();
        engine::check_subtree(&node).map_err(|reason| StrategyError::MalformedTemplate {
            name: name.to_string(),
            reason,
        })?;
        Ok(node)
    }
}

#[derive(Clone, Copy)]
enum Cell {
    Editable,
    Fixed(&'static str),
}

fn table(class_name: &str, rows: &[&[Cell]]) -> Node {
    let rows = rows
        .iter()
        .map(|cells| {
            let cells = cells
                .iter()
                .map(|cell| {
                    let (text, editable) = match cell {
                        Cell::Editable => ("", true),
                        Cell::Fixed(text) => (*text, false),
                    };
                    Node::Block(
                        Element::new(NodeType::TableCell)
                            .with_data("contentEditable", editable)
                            .with_children(vec![Node::text(text)]),
                    )
                })
                .collect();
            Node::block(NodeType::TableRow, cells)
        })
        .collect();

    Node::Block(
        Element::new(NodeType::Table)
            .with_data("className", class_name)
            .with_children(rows),
    )
}

fn arrow_table() -> Node {
    table("arrow", &[&[Cell::Editable, Cell::Fixed("→"), Cell::Editable]])
}

fn conversation_table() -> Node {
    table("conversation", &[
        &[Cell::Fixed("A:"), Cell::Editable],
        &[Cell::Fixed("B:"), Cell::Editable],
    ])
}

fn middle_table() -> Node {
    table("middle", &[&[Cell::Fixed(""), Cell::Editable, Cell::Fixed("")]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_templates_are_well_formed() {
        let registry = TemplateRegistry::builtin();
        assert_eq!(registry.names(), vec!["arrow", "conversation", "middle"]);
        for name in registry.names() {
            let node = registry.build(name).unwrap();
            assert_eq!(node.kind(), Some(&NodeType::Table));
        }
    }

    #[test]
    fn malformed_builder_is_rejected_on_build() {
        let mut registry = TemplateRegistry::new();
        registry
            .register(
                "broken",
                Arc::new(|| Node::block(NodeType::Table, Vec::new())),
            )
            .unwrap();

        assert!(matches!(
            registry.build("broken"),
            Err(StrategyError::MalformedTemplate { .. })
        ));
        assert_eq!(
            registry.build("missing"),
            Err(StrategyError::InvalidTemplate {
                name: "missing".to_string()
            })
        );
    }
}
