//! Human readable reports for missing configuration keys.
//!
//! A [`MissingKeyReport`] combines the access trace carried by a
//! [`MissingKey`] with the help schema of the tree it was resolving, and
//! tells the operator which lines their configuration needs.

use crate::config::{ConfigNode, HelpSchema, MissingKey};
use std::fmt::Write;

const RULE: &str = "-----------------------------------------------------------------";
const BANNER: &str = "=================================================================";

#[derive(Debug, Clone)]
pub struct MissingKeyReport {
    key: String,
    path: String,
    path_keys: Vec<String>,
    backtrace: String,
    /// Help for each level of the path, most general first.
    messages: Vec<String>,
    value_message: Option<String>,
}

impl MissingKeyReport {
    /// Build the report for `missing`, reading help from `root`.
    pub fn new(missing: &MissingKey, root: &ConfigNode) -> Self {
        let path_keys: Vec<String> = missing
            .path_keys()
            .iter()
            .map(|k| k.to_string())
            .collect();

        // Help may live in the root schema or in the schema of any node
        // reached along the way, addressed relative to that node.
        let mut candidates: Vec<&HelpSchema> = vec![root.schema()];
        let mut node = Some(root);
        let mut messages = Vec::new();
        let mut value_message = None;

        let levels = path_keys.iter().map(String::as_str).chain([missing.key()]);
        let depth = path_keys.len();
        for (level, key) in levels.enumerate() {
            let mut next: Vec<&HelpSchema> = candidates.iter().filter_map(|s| s.child(key)).collect();
            node = node.and_then(|n| n.node(key));
            if let Some(reached) = node {
                next.push(reached.schema());
            }
            if let Some(message) = next.iter().find_map(|s| s.message()) {
                messages.push(message.to_string());
            }
            if level == depth {
                value_message = next.iter().find_map(|s| s.value_message()).map(str::to_string);
            }
            candidates = next;
        }

        Self {
            key: missing.key().to_string(),
            path: missing.path(),
            path_keys,
            backtrace: missing.backtrace().to_string(),
            messages,
            value_message,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn value_message(&self) -> Option<&str> {
        self.value_message.as_deref()
    }

    pub fn has_help(&self) -> bool {
        !self.messages.is_empty() || self.value_message.is_some()
    }

    /// YAML lines the configuration is expected to contain.
    pub fn template(&self) -> String {
        let mut out = String::new();
        let mut indent = String::new();
        for key in &self.path_keys {
            let _ = writeln!(out, "{indent}{key}:");
            indent.push_str("  ");
        }
        let _ = write!(out, "{indent}{}: <<value>>", self.key);
        out
    }

    fn headline(&self, out: &mut String) {
        let _ = writeln!(out, "Could not find the key [{}]", self.key);
        let _ = writeln!(out, "in the configuration path [{}]", self.path);
        out.push('\n');
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push('\n');
        self.headline(&mut out);
        out.push_str(&self.backtrace);
        if !self.backtrace.ends_with('\n') {
            out.push('\n');
        }
        if !self.has_help() {
            return out;
        }

        let _ = writeln!(out, "\n{BANNER}\n");
        self.headline(&mut out);
        let _ = writeln!(out, "Please ensure your configuration contains the following lines");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "{}", self.template());
        let _ = writeln!(out, "{RULE}");
        if let Some(value_message) = &self.value_message {
            let _ = writeln!(out, "{value_message}");
        }
        if !self.messages.is_empty() {
            let _ = writeln!(out, "\n{}\n", self.messages.join("\n\n"));
        }
        out
    }

    /// Print the report and end the process. There is nothing to recover.
    pub fn terminate(self) -> ! {
        tracing::error!(key = %self.key, path = %self.path, "missing configuration key");
        eprint!("{}", self.render());
        std::process::exit(1);
    }
}
