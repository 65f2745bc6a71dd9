//! Traced access into configuration trees.
//!
//! Every access made through a [`Cursor`] or [`CursorMut`] is recorded as an
//! [`AccessFrame`] in a caller-owned [`AccessTrace`]. When a lookup misses,
//! a copy of the trace goes into a [`MissingKey`] error which carries
//! everything needed to explain which nested path was being resolved.

use super::node::{ConfigNode, Key, KeyPath, Value};
use crate::error::{ConfError, ConfResult};
use std::backtrace::Backtrace;
use std::fmt;

/// Root name of the plaintext tree.
pub const CONF_ROOT: &str = "Conf";
/// Root name of the encrypted tree.
pub const ENCRYPTED_ROOT: &str = "EncryptedConf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Root,
    Get,
    Set,
}

/// One recorded access: `owner` is the dotted path of the node accessed.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessFrame {
    pub owner: String,
    pub key: Key,
    pub kind: AccessKind,
    pub args: Vec<String>,
}

/// Ordered record of accesses made within one execution context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessTrace {
    frames: Vec<AccessFrame>,
}

impl AccessTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the trace and record entry into the tree called `root`.
    pub fn start(&mut self, root: &str) {
        self.frames.clear();
        self.frames.push(AccessFrame {
            owner: root.to_string(),
            key: Key::from(root),
            kind: AccessKind::Root,
            args: Vec::new(),
        });
    }

    /// Record an access unless it repeats the top frame's owner and key.
    pub fn calling(&mut self, owner: &str, key: Key, kind: AccessKind, args: Vec<String>) {
        if let Some(top) = self.frames.last()
            && top.owner == owner
            && top.key == key
        {
            return;
        }
        self.frames.push(AccessFrame {
            owner: owner.to_string(),
            key,
            kind,
            args,
        });
    }

    pub fn frames(&self) -> &[AccessFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.frames.truncate(len);
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Name of the tree this trace started in, if it was started.
    pub fn root_name(&self) -> Option<&str> {
        self.frames
            .first()
            .filter(|frame| frame.kind == AccessKind::Root)
            .map(|frame| frame.key.as_str())
    }
}

/// A traced lookup that missed.
///
/// The root frame supplies the path prefix, the final frame names the
/// missing key and every frame in between is one path segment.
#[derive(Debug)]
pub struct MissingKey {
    trace: AccessTrace,
    backtrace: String,
}

impl MissingKey {
    /// Take ownership of `trace` and capture the current stack.
    pub fn capture(trace: AccessTrace) -> Self {
        Self {
            trace,
            backtrace: Backtrace::force_capture().to_string(),
        }
    }

    pub fn trace(&self) -> &AccessTrace {
        &self.trace
    }

    pub fn backtrace(&self) -> &str {
        &self.backtrace
    }

    pub fn root_name(&self) -> &str {
        self.trace.root_name().unwrap_or(CONF_ROOT)
    }

    fn segments(&self) -> &[AccessFrame] {
        let frames = self.trace.frames();
        match frames.first() {
            Some(first) if first.kind == AccessKind::Root => &frames[1..],
            _ => frames,
        }
    }

    /// The key that could not be found.
    pub fn key(&self) -> &str {
        self.segments().last().map(|f| f.key.as_str()).unwrap_or("")
    }

    /// Keys traversed before the missing one.
    pub fn path_keys(&self) -> Vec<Key> {
        let segments = self.segments();
        match segments.split_last() {
            Some((_, parents)) => parents.iter().map(|f| f.key.clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Configuration path containing the missing key, e.g. `Conf.ssh`.
    pub fn path(&self) -> String {
        let mut path = self.root_name().to_string();
        for key in self.path_keys() {
            path.push('.');
            path.push_str(key.as_str());
        }
        path
    }
}

impl fmt::Display for MissingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Could not find the key [{}] in the configuration path [{}]",
            self.key(),
            self.path()
        )
    }
}

/// The trace stays with the caller so a cursor remains usable after a miss.
fn missing(trace: &AccessTrace) -> ConfError {
    MissingKey::capture(trace.clone()).into()
}

fn child_owner(owner: &str, key: &str) -> String {
    format!("{}.{}", owner, key)
}

/// Read-only traced view of a node.
///
/// Each access first truncates the trace back to the depth at which this
/// cursor was created, so sibling lookups replace one another instead of
/// accumulating.
pub struct Cursor<'a, 't> {
    node: &'a ConfigNode,
    trace: &'t mut AccessTrace,
    owner: String,
    depth: usize,
}

impl<'a, 't> Cursor<'a, 't> {
    /// Start a fresh trace at the root of a tree.
    pub fn root(node: &'a ConfigNode, trace: &'t mut AccessTrace, root: &str) -> Self {
        trace.start(root);
        let depth = trace.len();
        Self {
            node,
            trace,
            owner: root.to_string(),
            depth,
        }
    }

    /// Start at the root and descend through `path`, recording each step.
    pub fn at(
        node: &'a ConfigNode,
        trace: &'t mut AccessTrace,
        root: &str,
        path: impl Into<KeyPath>,
    ) -> ConfResult<Self> {
        let path = path.into();
        let mut cursor = Cursor::root(node, trace, root);
        for key in path.keys() {
            cursor = cursor.enter(key.as_str())?;
        }
        Ok(cursor)
    }

    pub fn node(&self) -> &'a ConfigNode {
        self.node
    }

    /// Dotted path of the node under the cursor, e.g. `Conf.ssh`.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn record(&mut self, key: &str) {
        self.trace.truncate(self.depth);
        self.trace
            .calling(&self.owner, Key::from(key), AccessKind::Get, Vec::new());
    }

    pub fn get(&mut self, key: &str) -> ConfResult<&'a Value> {
        self.record(key);
        let node = self.node;
        node.get(key).ok_or_else(|| missing(self.trace))
    }

    /// Untraced lookup for optional values.
    pub fn try_get(&self, key: &str) -> Option<&'a Value> {
        self.node.get(key)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.node.has_key(key)
    }

    pub fn get_str(&mut self, key: &str) -> ConfResult<&'a str> {
        let value = self.get(key)?;
        value
            .as_str()
            .ok_or_else(|| ConfError::wrong_type(child_owner(&self.owner, key), "a string", value.kind()))
    }

    pub fn get_i64(&mut self, key: &str) -> ConfResult<i64> {
        let value = self.get(key)?;
        value
            .as_i64()
            .ok_or_else(|| ConfError::wrong_type(child_owner(&self.owner, key), "an integer", value.kind()))
    }

    pub fn get_bool(&mut self, key: &str) -> ConfResult<bool> {
        let value = self.get(key)?;
        value
            .as_bool()
            .ok_or_else(|| ConfError::wrong_type(child_owner(&self.owner, key), "a boolean", value.kind()))
    }

    pub fn get_seq(&mut self, key: &str) -> ConfResult<&'a [Value]> {
        let value = self.get(key)?;
        value
            .as_seq()
            .ok_or_else(|| ConfError::wrong_type(child_owner(&self.owner, key), "a sequence", value.kind()))
    }

    /// Move into the node under `key`.
    pub fn enter(mut self, key: &str) -> ConfResult<Cursor<'a, 't>> {
        let child = self.child(key)?;
        let depth = self.trace.len();
        Ok(Cursor {
            node: child,
            owner: child_owner(&self.owner, key),
            trace: self.trace,
            depth,
        })
    }

    /// Borrow a cursor for the node under `key`, keeping this one usable.
    pub fn section(&mut self, key: &str) -> ConfResult<Cursor<'a, '_>> {
        let child = self.child(key)?;
        let depth = self.trace.len();
        Ok(Cursor {
            node: child,
            owner: child_owner(&self.owner, key),
            trace: &mut *self.trace,
            depth,
        })
    }

    fn child(&mut self, key: &str) -> ConfResult<&'a ConfigNode> {
        let value = self.get(key)?;
        value
            .as_node()
            .ok_or_else(|| ConfError::wrong_type(child_owner(&self.owner, key), "a mapping", value.kind()))
    }

    /// Traced lookup of a dotted path relative to this cursor.
    pub fn path(&mut self, path: impl Into<KeyPath>) -> ConfResult<&'a Value> {
        let path = path.into();
        let Some((last, parents)) = path.keys().split_last() else {
            return Err(ConfError::InvalidPath(path.to_string()));
        };
        let mut section = self.section_path(parents)?;
        section.get(last.as_str())
    }

    fn section_path(&mut self, keys: &[Key]) -> ConfResult<Cursor<'a, '_>> {
        self.trace.truncate(self.depth);
        let mut cursor = Cursor {
            node: self.node,
            owner: self.owner.clone(),
            depth: self.depth,
            trace: &mut *self.trace,
        };
        for key in keys {
            cursor = cursor.enter(key.as_str())?;
        }
        Ok(cursor)
    }
}

/// Mutable traced view of a node.
pub struct CursorMut<'a, 't> {
    node: &'a mut ConfigNode,
    trace: &'t mut AccessTrace,
    owner: String,
    depth: usize,
}

impl<'a, 't> CursorMut<'a, 't> {
    pub fn root(node: &'a mut ConfigNode, trace: &'t mut AccessTrace, root: &str) -> Self {
        trace.start(root);
        let depth = trace.len();
        Self {
            node,
            trace,
            owner: root.to_string(),
            depth,
        }
    }

    pub fn node(&self) -> &ConfigNode {
        self.node
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn record(&mut self, key: &str, kind: AccessKind, args: Vec<String>) {
        self.trace.truncate(self.depth);
        self.trace.calling(&self.owner, Key::from(key), kind, args);
    }

    /// Traced merge-on-assign, see [`ConfigNode::set`].
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> ConfResult<()> {
        let value = value.into();
        self.record(key, AccessKind::Set, vec![value.to_string()]);
        self.node.set(key, value)
    }

    pub fn get(&mut self, key: &str) -> ConfResult<&Value> {
        self.record(key, AccessKind::Get, Vec::new());
        match self.node.get(key) {
            Some(value) => Ok(value),
            None => Err(missing(self.trace)),
        }
    }

    /// Merge `incoming` into the node under the cursor.
    pub fn merge(&mut self, incoming: ConfigNode) -> ConfResult<()> {
        self.node.merge(incoming).map(|_| ())
    }

    /// Move into the existing node under `key`.
    pub fn enter(self, key: &str) -> ConfResult<CursorMut<'a, 't>> {
        let CursorMut {
            node,
            trace,
            owner,
            depth,
        } = self;
        trace.truncate(depth);
        trace.calling(&owner, Key::from(key), AccessKind::Get, Vec::new());
        let child_path = child_owner(&owner, key);
        match node.get_mut(key) {
            Some(Value::Node(child)) => {
                let depth = trace.len();
                Ok(CursorMut {
                    node: child,
                    trace,
                    owner: child_path,
                    depth,
                })
            }
            Some(other) => Err(ConfError::wrong_type(child_path, "a mapping", other.kind())),
            None => Err(missing(trace)),
        }
    }

    /// Move into the node under `key`, creating an empty section if absent.
    pub fn enter_or_create(self, key: &str) -> ConfResult<CursorMut<'a, 't>> {
        let CursorMut {
            node,
            trace,
            owner,
            depth,
        } = self;
        trace.truncate(depth);
        trace.calling(&owner, Key::from(key), AccessKind::Set, Vec::new());
        let child = node.ensure_node(key)?;
        let depth = trace.len();
        Ok(CursorMut {
            node: child,
            trace,
            owner: child_owner(&owner, key),
            depth,
        })
    }

    /// Borrow a mutable cursor for the section under `key`, creating it if absent.
    pub fn section(&mut self, key: &str) -> ConfResult<CursorMut<'_, '_>> {
        self.record(key, AccessKind::Set, Vec::new());
        let depth = self.trace.len();
        let owner = child_owner(&self.owner, key);
        Ok(CursorMut {
            node: self.node.ensure_node(key)?,
            trace: &mut *self.trace,
            owner,
            depth,
        })
    }
}
