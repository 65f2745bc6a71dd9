//! Command options for the local and remote execution helpers.
//!
//! The execution helpers themselves live outside this crate. This module
//! only keeps their configuration sections (`sh`, `ssh`, `scp`, `rsync`)
//! populated with defaults and resolves the values a helper needs, reading
//! required ones through the traced accessor so a missing `ssh.remoteHost`
//! produces the usual missing-key report.

use crate::config::{AccessTrace, CONF_ROOT, ConfigNode, ConfigStore, Cursor, Value};
use crate::error::{ConfError, ConfResult};
use std::fmt;
use std::str::FromStr;

/// Timeout applied when the caller does not request one.
pub const DEFAULT_TIMEOUT: i64 = 10;
/// Default for `timeout.maxTimeout`.
pub const DEFAULT_MAX_TIMEOUT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Sh,
    Ssh,
    Scp,
    Rsync,
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Sh => "sh",
            CommandKind::Ssh => "ssh",
            CommandKind::Scp => "scp",
            CommandKind::Rsync => "rsync",
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, CommandKind::Sh)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = ConfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sh" => Ok(CommandKind::Sh),
            "ssh" => Ok(CommandKind::Ssh),
            "scp" => Ok(CommandKind::Scp),
            "rsync" => Ok(CommandKind::Rsync),
            other => Err(ConfError::InvalidPath(other.to_string())),
        }
    }
}

/// Group of commands to configure at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSelector {
    All,
    Local,
    Remote,
    Only(CommandKind),
}

impl CommandSelector {
    /// Commands the selector expands to, local ones first.
    pub fn kinds(&self) -> Vec<CommandKind> {
        match self {
            CommandSelector::All => vec![
                CommandKind::Sh,
                CommandKind::Scp,
                CommandKind::Ssh,
                CommandKind::Rsync,
            ],
            CommandSelector::Local => vec![CommandKind::Sh],
            CommandSelector::Remote => vec![CommandKind::Scp, CommandKind::Ssh, CommandKind::Rsync],
            CommandSelector::Only(kind) => vec![*kind],
        }
    }
}

impl FromStr for CommandSelector {
    type Err = ConfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(CommandSelector::All),
            "local" => Ok(CommandSelector::Local),
            "remote" => Ok(CommandSelector::Remote),
            other => other.parse().map(CommandSelector::Only),
        }
    }
}

fn default_section(kind: CommandKind) -> ConfigNode {
    let mut section = ConfigNode::new();
    section.insert("command", kind.name());
    section.insert("cmdOptions", Value::Seq(Vec::new()));
    section.insert("commandPromptRegExp", ".");
    section
}

/// Make sure each selected command has a section, then merge `overrides`
/// into every one of them.
pub fn install_command_defaults(
    conf: &mut ConfigNode,
    selector: &CommandSelector,
    overrides: Option<&ConfigNode>,
) -> ConfResult<()> {
    for kind in selector.kinds() {
        if !conf.has_key(kind.name()) {
            conf.insert(kind.name(), default_section(kind));
        }
        if let Some(overrides) = overrides {
            conf.ensure_node(kind.name())?.merge(overrides.clone())?;
        }
    }
    Ok(())
}

/// `timeout.maxTimeout`, installing the default on first use.
pub fn max_timeout(conf: &mut ConfigNode) -> ConfResult<i64> {
    let timeout = conf.ensure_node("timeout")?;
    if !timeout.has_key("maxTimeout") {
        timeout.insert("maxTimeout", DEFAULT_MAX_TIMEOUT);
    }
    match timeout.get("maxTimeout") {
        Some(value) => value
            .as_i64()
            .ok_or_else(|| ConfError::wrong_type("timeout.maxTimeout", "an integer", value.kind())),
        None => Ok(DEFAULT_MAX_TIMEOUT),
    }
}

/// Fully resolved options for one command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOptions {
    pub kind: CommandKind,
    pub command: String,
    pub cmd_options: Vec<String>,
    pub prompt_regexp: String,
    pub user_id: Option<String>,
    pub remote_host: Option<String>,
    pub remote_port: Option<i64>,
    pub timeout: i64,
}

impl CommandOptions {
    /// Resolve the options for `kind`.
    ///
    /// `overrides` replace stored values key by key. A requested `timeout`
    /// is clamped to `timeout.maxTimeout`; without one the default applies.
    pub fn resolve(
        store: &mut ConfigStore,
        trace: &mut AccessTrace,
        kind: CommandKind,
        overrides: Option<&ConfigNode>,
    ) -> ConfResult<Self> {
        let max_timeout = max_timeout(store.data_mut())?;

        let mut section = store.conf(trace).enter(kind.name())?.node().clone();
        if let Some(overrides) = overrides {
            for (key, value) in overrides.iter() {
                section.insert(key, value.clone());
            }
        }
        let mut scope = ConfigNode::new();
        scope.insert(kind.name(), section);
        let mut cursor = Cursor::at(&scope, trace, CONF_ROOT, kind.name())?;

        let command = cursor.get_str("command")?.to_string();
        let cmd_options = match cursor.try_get("cmdOptions") {
            Some(Value::Seq(items)) => {
                let mut options = Vec::new();
                flatten_options(items, &mut options);
                options
            }
            Some(Value::Node(declared)) if declared.is_empty() => Vec::new(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.to_string()],
        };
        let prompt_regexp = cursor
            .try_get("commandPromptRegExp")
            .and_then(Value::as_str)
            .unwrap_or(".")
            .to_string();
        let (user_id, remote_host) = if kind.is_remote() {
            (
                Some(cursor.get_str("userId")?.to_string()),
                Some(cursor.get_str("remoteHost")?.to_string()),
            )
        } else {
            (None, None)
        };
        let remote_port = cursor.try_get("remotePort").and_then(Value::as_i64);
        let timeout = match cursor.try_get("timeout").and_then(Value::as_i64) {
            Some(requested) if requested > max_timeout => max_timeout,
            Some(requested) => requested,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            kind,
            command,
            cmd_options,
            prompt_regexp,
            user_id,
            remote_host,
            remote_port,
            timeout,
        })
    }

    /// `user@host:path` for copy commands.
    pub fn remote_target(&self, path: &str) -> String {
        format!(
            "{}@{}:{}",
            self.user_id.as_deref().unwrap_or_default(),
            self.remote_host.as_deref().unwrap_or_default(),
            path
        )
    }

    /// Command line prefix the execution helper would run.
    pub fn command_line(&self) -> Vec<String> {
        let mut argv = vec![self.command.clone()];
        argv.extend(self.cmd_options.iter().cloned());
        match self.kind {
            CommandKind::Sh => argv.push("-c".into()),
            CommandKind::Ssh => {
                if let Some(user) = &self.user_id {
                    argv.push("-l".into());
                    argv.push(user.clone());
                }
                if let Some(port) = self.remote_port {
                    argv.push("-p".into());
                    argv.push(port.to_string());
                }
                if let Some(host) = &self.remote_host {
                    argv.push(host.clone());
                }
            }
            CommandKind::Scp | CommandKind::Rsync => {}
        }
        argv
    }
}

/// Nested option lists become separate arguments.
fn flatten_options(items: &[Value], out: &mut Vec<String>) {
    for item in items {
        match item {
            Value::Seq(nested) => flatten_options(nested, out),
            Value::Null => {}
            other => out.push(other.to_string()),
        }
    }
}
