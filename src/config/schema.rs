//! Help text attached to configuration keys.
//!
//! Fragments may carry a top-level `missingKey` mapping mirroring the shape of
//! the configuration. Each level may define `message` (what the key is for)
//! and `valueMessage` (what a leaf value should look like).

use super::node::Key;
use std::collections::BTreeMap;

/// Reserved top-level fragment key holding help text.
pub const HELP_KEY: &str = "missingKey";

const MESSAGE_KEY: &str = "message";
const VALUE_MESSAGE_KEY: &str = "valueMessage";

/// Tree of help messages addressed by key path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelpSchema {
    message: Option<String>,
    value_message: Option<String>,
    children: BTreeMap<Key, HelpSchema>,
}

impl HelpSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn value_message(&self) -> Option<&str> {
        self.value_message.as_deref()
    }

    pub fn child(&self, key: &str) -> Option<&HelpSchema> {
        self.children.get(key)
    }

    pub fn children(&self) -> impl Iterator<Item = (&Key, &HelpSchema)> {
        self.children.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.value_message.is_none() && self.children.is_empty()
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn set_value_message(&mut self, value_message: impl Into<String>) {
        self.value_message = Some(value_message.into());
    }

    /// Entry at `keys`, creating empty levels on the way.
    pub fn entry(&mut self, keys: &[Key]) -> &mut HelpSchema {
        let mut entry = self;
        for key in keys {
            entry = entry.children.entry(key.clone()).or_default();
        }
        entry
    }

    pub fn at(&self, keys: &[Key]) -> Option<&HelpSchema> {
        let mut entry = self;
        for key in keys {
            entry = entry.children.get(key.as_str())?;
        }
        Some(entry)
    }

    /// Overlay `other`; its messages win where both define one.
    pub fn merge(&mut self, other: HelpSchema) {
        if other.message.is_some() {
            self.message = other.message;
        }
        if other.value_message.is_some() {
            self.value_message = other.value_message;
        }
        for (key, child) in other.children {
            self.children.entry(key).or_default().merge(child);
        }
    }

    /// Parse the value found under [`HELP_KEY`] in a fragment.
    ///
    /// Non-mapping levels are ignored. `message` and `valueMessage` are only
    /// treated as text when they hold strings, so a configuration key that
    /// happens to be called `message` can still be described by nesting.
    pub fn from_yaml(value: &serde_yaml::Value) -> Self {
        let mut schema = HelpSchema::new();
        let serde_yaml::Value::Mapping(mapping) = value else {
            return schema;
        };
        for (key, child) in mapping {
            let Some(name) = key.as_str() else {
                continue;
            };
            match (name, child) {
                (MESSAGE_KEY, serde_yaml::Value::String(text)) => schema.set_message(text.clone()),
                (VALUE_MESSAGE_KEY, serde_yaml::Value::String(text)) => {
                    schema.set_value_message(text.clone())
                }
                _ => {
                    let parsed = HelpSchema::from_yaml(child);
                    if !parsed.is_empty() {
                        schema.children.entry(Key::from(name)).or_default().merge(parsed);
                    }
                }
            }
        }
        schema
    }
}
