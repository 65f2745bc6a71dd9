//! Recursive merge for configuration nodes.
//!
//! Merging is the single override mechanism: the order of merge calls is the
//! whole precedence model.
//! - Mappings merge recursively, creating missing sections
//! - Sequences are concatenated, never replaced or de-duplicated
//! - Scalars are overwritten (last merge wins)
//! - Help schemas merge alongside the values

use super::node::{ConfigNode, Key, Value};
use crate::error::{ConfError, ConfResult};

impl ConfigNode {
    /// Merge `incoming` into this node and return `self` for chaining.
    ///
    /// # Example
    /// ```
    /// use cook_conf::config::{ConfigNode, Value};
    ///
    /// let mut base = ConfigNode::new();
    /// base.merge_yaml_str("ssh: {remoteHost: a, cmdOptions: [-q]}").unwrap();
    /// base.merge_yaml_str("ssh: {remoteHost: b, cmdOptions: [-t]}").unwrap();
    ///
    /// assert_eq!(base.lookup("ssh.remoteHost"), Some(&Value::from("b")));
    /// assert_eq!(
    ///     base.lookup("ssh.cmdOptions"),
    ///     Some(&Value::Seq(vec![Value::from("-q"), Value::from("-t")]))
    /// );
    /// ```
    pub fn merge(&mut self, incoming: ConfigNode) -> ConfResult<&mut Self> {
        self.merge_at("", incoming)?;
        Ok(self)
    }

    /// Parse a YAML mapping and merge it. Null or empty documents are no-ops.
    pub fn merge_yaml_str(&mut self, yaml: &str) -> ConfResult<&mut Self> {
        match serde_yaml::from_str::<serde_yaml::Value>(yaml).map_err(|source| {
            ConfError::Fragment {
                path: "<string>".into(),
                source,
            }
        })? {
            serde_yaml::Value::Null => Ok(self),
            serde_yaml::Value::Mapping(mapping) => self.merge(ConfigNode::from_yaml_mapping(mapping)),
            _ => Err(ConfError::FragmentShape {
                path: "<string>".into(),
            }),
        }
    }

    pub(super) fn merge_at(&mut self, prefix: &str, incoming: ConfigNode) -> ConfResult<()> {
        let ConfigNode { entries, schema } = incoming;
        for (key, value) in entries {
            let path = join_path(prefix, &key);
            match value {
                Value::Node(child) => {
                    let slot = self
                        .entries
                        .entry(key)
                        .or_insert_with(|| Value::Node(ConfigNode::new()));
                    match slot {
                        Value::Node(existing) => existing.merge_at(&path, child)?,
                        _ => return Err(ConfError::type_conflict(path, "a mapping", "non-mapping")),
                    }
                }
                Value::Seq(items) => {
                    let slot = self
                        .entries
                        .entry(key)
                        .or_insert_with(|| Value::Seq(Vec::new()));
                    match slot {
                        Value::Seq(existing) => existing.extend(items),
                        _ => {
                            return Err(ConfError::type_conflict(
                                path,
                                "a sequence",
                                "non-sequence",
                            ));
                        }
                    }
                }
                scalar => self.assign(&path, key, scalar)?,
            }
        }
        self.schema.merge(schema);
        Ok(())
    }
}

/// Merge several nodes in order, later nodes taking precedence for scalars.
pub fn merge_all(nodes: impl IntoIterator<Item = ConfigNode>) -> ConfResult<ConfigNode> {
    let mut merged = ConfigNode::new();
    for node in nodes {
        merged.merge(node)?;
    }
    Ok(merged)
}

fn join_path(prefix: &str, key: &Key) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn node(yaml: &str) -> ConfigNode {
        let mut node = ConfigNode::new();
        node.merge_yaml_str(yaml).unwrap();
        node
    }

    fn as_json(node: &ConfigNode) -> serde_json::Value {
        serde_json::Value::Object(node.flatten())
    }

    #[test]
    fn test_merge_simple_nodes() {
        let mut base = node("a: 1\nb: 2\n");
        base.merge(node("b: 3\nc: 4\n")).unwrap();
        assert_eq!(as_json(&base), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_merge_nested_nodes() {
        let mut base = node("server: {host: localhost, port: 8080}\ndebug: true\n");
        base.merge(node("server: {port: 9000}\n")).unwrap();
        assert_eq!(
            as_json(&base),
            json!({
                "server": {"host": "localhost", "port": 9000},
                "debug": true
            })
        );
    }

    #[test]
    fn test_sequences_concatenate() {
        let mut base = node("items: [1, 2, 3]\n");
        base.merge(node("items: [3, 4]\n")).unwrap();
        assert_eq!(as_json(&base), json!({"items": [1, 2, 3, 3, 4]}));
    }

    #[test]
    fn test_sequence_created_when_absent() {
        let mut base = node("other: x\n");
        base.merge(node("items: [a]\n")).unwrap();
        assert_eq!(as_json(&base), json!({"other": "x", "items": ["a"]}));
    }

    #[test]
    fn test_mapping_into_scalar_conflicts() {
        let mut base = node("value: 42\n");
        let err = base.merge(node("value: {nested: true}\n")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeConflict);
        assert!(err.to_string().contains("[value]"));
    }

    #[test]
    fn test_sequence_into_mapping_conflicts() {
        let mut base = node("ssh: {command: ssh}\n");
        let err = base.merge(node("ssh: [a]\n")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeConflict);
    }

    #[test]
    fn test_conflict_reports_nested_path() {
        let mut base = node("ssh: {cmdOptions: -q}\n");
        let err = base.merge(node("ssh: {cmdOptions: [-t]}\n")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "attempting to merge a sequence into an existing non-sequence key [ssh.cmdOptions]"
        );
    }

    #[test]
    fn test_scalar_replaces_node() {
        // Scalars overwrite unconditionally, mirroring last-merge-wins.
        let mut base = node("value: {nested: true}\n");
        base.merge(node("value: 42\n")).unwrap();
        assert_eq!(as_json(&base), json!({"value": 42}));
    }

    #[test]
    fn test_null_replaces_scalar_with_empty_section() {
        let mut base = node("timeout: 5\nssh: {userId: deploy}\n");
        base.merge_yaml_str("timeout:\nssh:\n").unwrap();
        assert_eq!(base.get("timeout"), Some(&Value::Node(ConfigNode::new())));
        assert_eq!(base.lookup("ssh.userId"), Some(&Value::from("deploy")));
    }

    #[test]
    fn test_nested_null_declares_section() {
        let mut base = node("deploy: {target: prod}\n");
        base.merge(node("deploy:\n  target:\n  hooks:\n")).unwrap();
        assert_eq!(
            as_json(&base),
            json!({"deploy": {"target": {}, "hooks": {}}})
        );
    }

    #[test]
    fn test_last_write_wins_regardless_of_grouping() {
        let a = "shared: a\nonly_a: 1\nlist: [a]\n";
        let b = "shared: b\nonly_b: 2\nlist: [b]\n";

        let mut sequential = node("shared: base\nlist: [base]\n");
        sequential.merge(node(a)).unwrap();
        sequential.merge(node(b)).unwrap();

        let mut grouped = node("shared: base\nlist: [base]\n");
        let mut ab = node(a);
        ab.merge(node(b)).unwrap();
        grouped.merge(ab).unwrap();

        assert_eq!(as_json(&sequential), as_json(&grouped));
        assert_eq!(
            as_json(&sequential),
            json!({"shared": "b", "only_a": 1, "only_b": 2, "list": ["base", "a", "b"]})
        );
    }

    #[test]
    fn test_merge_carries_help_schema() {
        let mut incoming = node("ssh: {userId: deploy}\n");
        incoming.describe("ssh", Some("Remote shell settings"), None);

        let mut base = ConfigNode::new();
        base.merge(incoming).unwrap();
        assert_eq!(
            base.schema().child("ssh").and_then(|s| s.message()),
            Some("Remote shell settings")
        );
    }

    #[test]
    fn test_merge_all() {
        let merged = merge_all(vec![node("a: 1\n"), node("b: 2\n"), node("a: 3\nc: 4\n")]).unwrap();
        assert_eq!(as_json(&merged), json!({"a": 3, "b": 2, "c": 4}));
    }

    #[test]
    fn test_merge_chains() {
        let mut base = ConfigNode::new();
        base.merge(node("a: 1\n"))
            .unwrap()
            .merge(node("b: 2\n"))
            .unwrap();
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_non_mapping_document_rejected() {
        let mut base = ConfigNode::new();
        assert!(base.merge_yaml_str("- a\n- b\n").is_err());
        assert!(base.merge_yaml_str("").unwrap().is_empty());
    }
}
