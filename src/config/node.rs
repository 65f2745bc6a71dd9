//! Dynamically keyed configuration nodes.
//!
//! A [`ConfigNode`] maps symbolic [`Key`]s to [`Value`]s, where a value is a
//! scalar, a sequence, or another node. Every node also owns a
//! [`HelpSchema`] addressed by the same key paths as its values.

use super::schema::HelpSchema;
use crate::error::{ConfError, ConfResult};
use serde_json::{Map, Number};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Symbolic configuration key. Equality, ordering and hashing go by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::new(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dot separated sequence of keys, e.g. `ssh.remoteHost`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPath(Vec<Key>);

impl KeyPath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    pub fn push(&mut self, key: impl Into<Key>) {
        self.0.push(key.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for KeyPath {
    /// Split on `.`; empty segments are ignored.
    fn from(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|segment| !segment.is_empty())
                .map(Key::from)
                .collect(),
        )
    }
}

impl From<&String> for KeyPath {
    fn from(path: &String) -> Self {
        KeyPath::from(path.as_str())
    }
}

impl From<&[&str]> for KeyPath {
    fn from(keys: &[&str]) -> Self {
        Self(keys.iter().map(|k| Key::from(*k)).collect())
    }
}

impl From<Vec<Key>> for KeyPath {
    fn from(keys: Vec<Key>) -> Self {
        Self(keys)
    }
}

impl From<&KeyPath> for KeyPath {
    fn from(path: &KeyPath) -> Self {
        path.clone()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(key.as_str())?;
        }
        Ok(())
    }
}

/// A configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Value>),
    Node(ConfigNode),
}

impl Value {
    /// Short description of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Node(_) => "mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&ConfigNode> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut ConfigNode> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    /// Convert a parsed YAML value. Mappings become nodes, tags are dropped.
    pub fn from_yaml(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yaml::Value::String(s) => Value::Str(s),
            serde_yaml::Value::Sequence(items) => {
                Value::Seq(items.into_iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(mapping) => Value::Node(ConfigNode::from_yaml_mapping(mapping)),
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value),
        }
    }

    /// Convert into a JSON value, nested nodes becoming objects.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Seq(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Node(node) => serde_json::Value::Object(node.flatten()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Node(node) => {
                f.write_str("{")?;
                for (i, (key, value)) in node.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(items)
    }
}

impl From<ConfigNode> for Value {
    fn from(node: ConfigNode) -> Self {
        Value::Node(node)
    }
}

/// Recursive configuration namespace with a parallel help schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigNode {
    pub(super) entries: BTreeMap<Key, Value>,
    pub(super) schema: HelpSchema,
}

impl ConfigNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a node from a YAML mapping.
    ///
    /// Null values are kept as parsed. Merging the node turns each of them
    /// into an empty section, replacing a scalar or leaving a section alone.
    pub fn from_yaml_mapping(mapping: serde_yaml::Mapping) -> Self {
        let mut node = ConfigNode::new();
        for (key, value) in mapping {
            node.entries
                .insert(Key::from(yaml_key_name(&key)), Value::from_yaml(value));
        }
        node
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Nested node stored under `key`, if any.
    pub fn node(&self, key: &str) -> Option<&ConfigNode> {
        self.get(key).and_then(Value::as_node)
    }

    /// Assign `value` to `key`.
    ///
    /// Assigning a node to a key that already holds a node merges the two,
    /// so repeated partial assignment composes. Assigning null declares an
    /// empty section (an existing section is left untouched).
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> ConfResult<()> {
        let key = key.into();
        let path = key.to_string();
        self.assign(&path, key, value.into())
    }

    pub(super) fn assign(&mut self, path: &str, key: Key, value: Value) -> ConfResult<()> {
        let value = match value {
            Value::Null => Value::Node(ConfigNode::new()),
            other => other,
        };
        if let Value::Node(incoming) = value {
            if let Some(Value::Node(existing)) = self.entries.get_mut(&key) {
                return existing.merge_at(path, incoming);
            }
            self.entries.insert(key, Value::Node(incoming));
        } else {
            self.entries.insert(key, value);
        }
        Ok(())
    }

    /// Store `value` verbatim, replacing whatever `key` held.
    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Node under `key`, created empty if absent.
    pub fn ensure_node(&mut self, key: impl Into<Key>) -> ConfResult<&mut ConfigNode> {
        let key = key.into();
        let path = key.to_string();
        let slot = self
            .entries
            .entry(key)
            .or_insert_with(|| Value::Node(ConfigNode::new()));
        slot.as_node_mut()
            .ok_or_else(|| ConfError::type_conflict(path, "a mapping", "non-mapping"))
    }

    /// Untraced lookup along `path`. An empty path yields `None`.
    pub fn lookup(&self, path: impl Into<KeyPath>) -> Option<&Value> {
        let path = path.into();
        let (last, parents) = path.keys().split_last()?;
        let mut node = self;
        for key in parents {
            node = node.node(key.as_str())?;
        }
        node.get(last.as_str())
    }

    pub fn schema(&self) -> &HelpSchema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut HelpSchema {
        &mut self.schema
    }

    /// Register help text for the key at `path`.
    pub fn describe(
        &mut self,
        path: impl Into<KeyPath>,
        message: Option<&str>,
        value_message: Option<&str>,
    ) {
        let path = path.into();
        let entry = self.schema.entry(path.keys());
        if let Some(message) = message {
            entry.set_message(message);
        }
        if let Some(value_message) = value_message {
            entry.set_value_message(value_message);
        }
    }

    /// Plain string-keyed projection of this node, recursively.
    pub fn flatten(&self) -> Map<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_json()))
            .collect()
    }

    /// Write every leaf as `prefix.key=value`, keys sorted at every level.
    pub fn render(&self, sink: &mut impl fmt::Write, prefix: &str) -> fmt::Result {
        let mut keys: Vec<&Key> = self.entries.keys().collect();
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        for key in keys {
            let child_prefix = format!("{}.{}", prefix, key);
            match &self.entries[key] {
                Value::Node(node) => node.render(sink, &child_prefix)?,
                value => writeln!(sink, "{}={}", child_prefix, value)?,
            }
        }
        Ok(())
    }

    pub fn rendered(&self, prefix: &str) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.render(&mut out, prefix);
        out
    }
}

fn yaml_key_name(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "~".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
