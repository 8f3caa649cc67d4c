use serde::{Deserialize, Serialize};

use crate::core::{Document, EditorState, Selection};

const VALUE_KIND: &str = "value";

fn value_kind() -> String {
    VALUE_KIND.to_string()
}

/// Saved editor value in the Slate-style JSON shape:
/// `{"kind":"value","document":{"nodes":[...]}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedValue {
    #[serde(default = "value_kind")]
    pub kind: String,
    pub document: Document,
}

impl SavedValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            kind: value_kind(),
            document,
        }
    }

    /// Editor state with the cursor at the start of the first leaf block.
    pub fn into_state(self) -> EditorState {
        let document = self.document;
        let selection = document
            .leaf_blocks()
            .first()
            .and_then(|block| Selection::start_of(&document, block.key))
            .unwrap_or_default();
        EditorState::new(document, selection)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a saved value. Stored keys are not trusted; every node gets a
    /// fresh one.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let mut value: Self = serde_json::from_str(s)?;
        value.document.assign_keys();
        Ok(value)
    }
}
