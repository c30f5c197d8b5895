//! Path resolution over the namespace tree.
//!
//! Paths are `/`-separated. A leading `/` forces absolute resolution from
//! the root; otherwise resolution starts at the given relative namespace
//! (the root when none is given). Empty segments — `""`, a trailing slash,
//! doubled slashes — stay at the current node.

use std::sync::Arc;

use super::Namespace;
use crate::communication::{Communication, CommunicationError, Result};

/// Resolver owning the root of one runtime's namespace tree.
///
/// The root is created with the resolver and never deleted; everything else
/// hangs off it. Each runtime (and each test) constructs its own resolver, so
/// there is no process-global tree.
pub struct NamespaceResolver {
    root: Arc<Namespace>,
}

impl NamespaceResolver {
    pub fn new() -> Self {
        Self {
            root: Namespace::root(),
        }
    }

    /// The root namespace, addressed by the path `/`.
    pub fn root(&self) -> &Arc<Namespace> {
        &self.root
    }

    /// Walk `path` one segment at a time and return the matching namespace.
    ///
    /// A segment matches a same-named child entry of kind namespace only;
    /// entries of any other kind never participate in traversal. Returns
    /// `None` when a segment cannot be matched — resolution never panics.
    pub fn resolve(&self, path: &str, relative: Option<&Arc<Namespace>>) -> Option<Arc<Namespace>> {
        let mut current = if path.starts_with('/') {
            self.root.clone()
        } else {
            relative.cloned().unwrap_or_else(|| self.root.clone())
        };

        for segment in path.split('/') {
            if segment.is_empty() {
                continue;
            }
            current = current.child(segment)?;
        }

        Some(current)
    }

    /// Create an empty namespace under the parent at `parent_path`.
    ///
    /// An unresolved parent is a caller bug and fails loudly with a
    /// namespace-not-found error; a sibling name collision fails with an
    /// already-defined error.
    pub fn create_namespace(
        &self,
        parent_path: &str,
        name: &str,
        relative: Option<&Arc<Namespace>>,
    ) -> Result<Arc<Namespace>> {
        let parent = self
            .resolve(parent_path, relative)
            .ok_or_else(|| CommunicationError::NamespaceNotFound(parent_path.to_string()))?;

        let namespace = Namespace::new(name)?;
        namespace.set_parent(&parent);
        parent.insert(name, Communication::Namespace(namespace.clone()))?;

        tracing::debug!(path = %namespace.full_path(), "namespace created");
        Ok(namespace)
    }

    /// Remove the namespace at `path` from its parent.
    ///
    /// Deletion is idempotent: an unresolved path is a no-op, as is deleting
    /// the root (it has no parent to remove it from). Double-unload must
    /// never crash the runtime.
    pub fn delete_namespace(&self, path: &str, relative: Option<&Arc<Namespace>>) {
        let Some(namespace) = self.resolve(path, relative) else {
            return;
        };
        if let Some(parent) = namespace.parent() {
            parent.remove(namespace.name());
            tracing::debug!(path = %path, "namespace deleted");
        }
    }
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::FunctionCommunication;

    fn tree() -> NamespaceResolver {
        let resolver = NamespaceResolver::new();
        resolver.create_namespace("/", "a", None).unwrap();
        resolver.create_namespace("/a", "b", None).unwrap();
        resolver.create_namespace("/a/b", "c", None).unwrap();
        resolver.create_namespace("/", "x", None).unwrap();
        resolver
    }

    #[test]
    fn test_resolve_absolute() {
        let resolver = tree();

        assert!(resolver.resolve("/", None).is_some());
        assert_eq!(resolver.resolve("/a/b", None).unwrap().name(), "b");
        assert_eq!(resolver.resolve("/a/b/c", None).unwrap().name(), "c");
        assert!(resolver.resolve("/a/missing", None).is_none());
    }

    #[test]
    fn test_resolve_relative() {
        let resolver = tree();
        let a = resolver.resolve("/a", None).unwrap();

        assert_eq!(resolver.resolve("b/c", Some(&a)).unwrap().name(), "c");
        // leading slash ignores the relative namespace
        assert_eq!(resolver.resolve("/x", Some(&a)).unwrap().name(), "x");
        // no relative namespace means the root
        assert_eq!(resolver.resolve("a", None).unwrap().name(), "a");
    }

    #[test]
    fn test_empty_segments_stay_put() {
        let resolver = tree();
        let a = resolver.resolve("/a", None).unwrap();

        assert!(Arc::ptr_eq(&resolver.resolve("", Some(&a)).unwrap(), &a));
        let b = resolver.resolve("b/", Some(&a)).unwrap();
        assert_eq!(b.name(), "b");
        assert_eq!(resolver.resolve("b//c", Some(&a)).unwrap().name(), "c");
    }

    #[test]
    fn test_non_namespace_entries_do_not_traverse() {
        let resolver = NamespaceResolver::new();
        resolver
            .root()
            .insert(
                "f",
                Communication::Function(Arc::new(FunctionCommunication::new(|_| Ok(None)))),
            )
            .unwrap();

        assert!(resolver.resolve("/f", None).is_none());
    }

    #[test]
    fn test_create_namespace_errors() {
        let resolver = tree();

        assert!(matches!(
            resolver.create_namespace("/missing", "n", None),
            Err(CommunicationError::NamespaceNotFound(_))
        ));
        assert!(matches!(
            resolver.create_namespace("/", "a", None),
            Err(CommunicationError::AlreadyDefined { .. })
        ));
        assert!(matches!(
            resolver.create_namespace("/", "bad name", None),
            Err(CommunicationError::InvalidName(_))
        ));
    }

    #[test]
    fn test_delete_namespace_is_idempotent() {
        let resolver = tree();

        resolver.delete_namespace("/a/b", None);
        assert!(resolver.resolve("/a/b", None).is_none());
        assert!(resolver.resolve("/a/b/c", None).is_none());

        // second deletion of the same path is a silent no-op
        resolver.delete_namespace("/a/b", None);

        // deleting the root is a no-op as well
        resolver.delete_namespace("/", None);
        assert!(resolver.resolve("/a", None).is_some());
    }

    #[test]
    fn test_full_path_round_trip() {
        let resolver = tree();

        let mut stack = vec![resolver.root().clone()];
        while let Some(ns) = stack.pop() {
            let resolved = resolver.resolve(&ns.full_path(), None).unwrap();
            assert!(Arc::ptr_eq(&resolved, &ns));

            for (_, entry) in ns.entries() {
                if let Communication::Namespace(child) = entry {
                    stack.push(child);
                }
            }
        }
    }
}
