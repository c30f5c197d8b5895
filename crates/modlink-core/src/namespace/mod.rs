//! Namespace tree nodes.
//!
//! A namespace is a node in the hierarchical registry tree. It owns its
//! communication entries inline and keeps a weak back-reference to its parent
//! for path reconstruction only — the parent never owns a child through that
//! pointer.

pub mod resolver;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::communication::{is_valid_name, Communication, CommunicationError, Result};

pub use resolver::NamespaceResolver;

/// A named node in the registry tree.
///
/// Sibling entries (communications or child namespaces) always have mutually
/// unique names; every mutation of the entry map is atomic under its lock, so
/// concurrent readers see either the fully registered entry or none of it.
pub struct Namespace {
    name: String,
    entries: RwLock<HashMap<String, Communication>>,
    parent: RwLock<Weak<Namespace>>,
}

impl Namespace {
    /// Create a detached namespace node with a validated name.
    pub fn new(name: &str) -> Result<Arc<Self>> {
        if !is_valid_name(name) {
            return Err(CommunicationError::InvalidName(name.to_string()));
        }
        Ok(Arc::new(Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
            parent: RwLock::new(Weak::new()),
        }))
    }

    /// The process root. Its name is empty and it has no parent.
    pub(crate) fn root() -> Arc<Self> {
        Arc::new(Self {
            name: String::new(),
            entries: RwLock::new(HashMap::new()),
            parent: RwLock::new(Weak::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    /// The parent namespace, if this node is attached to the tree.
    pub fn parent(&self) -> Option<Arc<Namespace>> {
        self.parent.read().upgrade()
    }

    pub(crate) fn set_parent(&self, parent: &Arc<Namespace>) {
        *self.parent.write() = Arc::downgrade(parent);
    }

    /// Absolute path of this namespace, `/` for the root.
    pub fn full_path(&self) -> String {
        let mut names = Vec::new();
        if !self.name.is_empty() {
            names.push(self.name.clone());
        }
        let mut current = self.parent();
        while let Some(ns) = current {
            if !ns.name.is_empty() {
                names.push(ns.name.clone());
            }
            current = ns.parent();
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    /// Look up an entry by its local name.
    pub fn get(&self, name: &str) -> Option<Communication> {
        self.entries.read().get(name).cloned()
    }

    /// Look up a child entry of kind namespace.
    pub fn child(&self, name: &str) -> Option<Arc<Namespace>> {
        self.get(name).and_then(|c| c.as_namespace().cloned())
    }

    /// Register an entry, enforcing the name grammar and sibling uniqueness.
    pub fn insert(&self, name: &str, communication: Communication) -> Result<()> {
        if !is_valid_name(name) {
            return Err(CommunicationError::InvalidName(name.to_string()));
        }
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(name) {
            return Err(CommunicationError::AlreadyDefined {
                kind: existing.kind(),
                name: name.to_string(),
            });
        }
        entries.insert(name.to_string(), communication);
        Ok(())
    }

    /// Remove an entry by name, returning it if it was present.
    pub fn remove(&self, name: &str) -> Option<Communication> {
        self.entries.write().remove(name)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Snapshot of the entries, sorted by name.
    pub fn entries(&self) -> Vec<(String, Communication)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Dump the subtree rooted here, one line per node or entry.
    pub fn pretty_print(&self, line: &mut impl FnMut(&str)) {
        self.pretty_print_indented(0, line);
    }

    fn pretty_print_indented(&self, indent: usize, line: &mut impl FnMut(&str)) {
        let pad = " ".repeat(indent);
        let shown = if self.is_root() { "/" } else { &self.name };
        line(&format!("{pad}N {shown}"));

        for (name, entry) in self.entries() {
            match entry {
                Communication::Namespace(child) => child.pretty_print_indented(indent + 4, line),
                other => line(&format!("{}C {} {:?}", " ".repeat(indent + 4), other.kind(), name)),
            }
        }
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("entries", &self.entry_count())
            .finish()
    }
}
