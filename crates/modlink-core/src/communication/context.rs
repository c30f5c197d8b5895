//! Per-module communication API surface.
//!
//! A [`CommunicationContext`] is the capability object handed to a module at
//! load time. It is scoped to the module's namespace (and, through
//! [`namespace`](CommunicationContext::namespace) blocks, to any nested
//! namespace declared under it) and mediates every create, invoke, subscribe
//! and open operation against the resolver and the registry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::broadcast::{BroadcastCommunication, Broadcaster, Subscription};
use super::error::{CommunicationError, Result};
use super::extension_point::{
    CapabilitySpec, ExtensionPointCommunication, ExtensionPointHandle, Implementor,
};
use super::stream::{StreamCommunication, StreamSession};
use super::value::{Arguments, Value};
use super::{Communication, CommunicationKind, FunctionCommunication};
use crate::flags::FlagRegistry;
use crate::namespace::{Namespace, NamespaceResolver};

/// Bookkeeping shared by a context and every nested context derived from it.
///
/// Everything a module registers outside its own namespace subtree —
/// subscriptions on foreign broadcasters, implementors on foreign extension
/// points, flag claims — is recorded here so unload can retract it.
#[derive(Default)]
struct ContextShared {
    claimed_flags: Mutex<HashMap<String, String>>,
    subscriptions: Mutex<Vec<Weak<Subscription>>>,
    implementors: Mutex<Vec<(Weak<ExtensionPointCommunication>, Weak<Implementor>)>>,
}

/// Communication API entry point for one module (or the host).
pub struct CommunicationContext {
    resolver: Arc<NamespaceResolver>,
    flags: Arc<FlagRegistry>,
    namespace: Arc<Namespace>,
    /// Idempotent contexts tolerate re-declaring an entry of the same kind,
    /// keeping the original. Used by the host, which may re-initialize.
    idempotent: bool,
    shared: Arc<ContextShared>,
}

impl CommunicationContext {
    pub(crate) fn new(
        resolver: Arc<NamespaceResolver>,
        flags: Arc<FlagRegistry>,
        namespace: Arc<Namespace>,
        idempotent: bool,
    ) -> Self {
        Self {
            resolver,
            flags,
            namespace,
            idempotent,
            shared: Arc::new(ContextShared::default()),
        }
    }

    /// Absolute path of the namespace this context is scoped to.
    pub fn namespace_path(&self) -> String {
        self.namespace.full_path()
    }

    /// Declare a child namespace and run `build` with a context scoped to it.
    pub fn namespace<F>(&self, name: &str, build: F) -> Result<()>
    where
        F: FnOnce(&CommunicationContext) -> Result<()>,
    {
        let child = match self.resolver.create_namespace("", name, Some(&self.namespace)) {
            Ok(namespace) => namespace,
            Err(CommunicationError::AlreadyDefined {
                kind: CommunicationKind::Namespace,
                ..
            }) if self.idempotent => self
                .namespace
                .child(name)
                .ok_or_else(|| CommunicationError::NamespaceNotFound(name.to_string()))?,
            Err(err) => return Err(err),
        };
        build(&self.scoped(child))
    }

    // Functions ===============================================================

    /// Register a function entry in the current namespace.
    ///
    /// The handler runs synchronously on whatever thread invokes it.
    pub fn create_function(
        &self,
        name: &str,
        handler: impl Fn(&Arguments) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Result<()> {
        self.register(
            name,
            Communication::Function(Arc::new(FunctionCommunication::new(handler))),
        )
        .map(|_| ())
    }

    /// Invoke a function registered in the global namespace.
    pub fn invoke_function(&self, name: &str, args: &Arguments) -> Result<Option<Value>> {
        self.invoke_function_in("/", name, args)
    }

    /// Invoke a function at `path/name`, resolved from the global root.
    pub fn invoke_function_in(
        &self,
        path: &str,
        name: &str,
        args: &Arguments,
    ) -> Result<Option<Value>> {
        match self.lookup(path, name, CommunicationKind::Function)? {
            Communication::Function(function) => function.invoke(args),
            _ => unreachable!("lookup checked the kind"),
        }
    }

    // Broadcasts ==============================================================

    /// Register a broadcast entry and return its trigger handle.
    pub fn create_broadcaster(&self, name: &str) -> Result<Broadcaster> {
        let broadcast = Arc::new(BroadcastCommunication::new());
        match self.register(name, Communication::Broadcast(broadcast.clone()))? {
            Some(Communication::Broadcast(existing)) => Ok(Broadcaster::new(existing)),
            _ => Ok(Broadcaster::new(broadcast)),
        }
    }

    /// Subscribe to a broadcast registered in the global namespace.
    pub fn subscribe_to_broadcast(
        &self,
        name: &str,
        handler: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> Result<Arc<Subscription>> {
        self.subscribe_to_broadcast_in("/", name, handler)
    }

    /// Subscribe to the broadcast at `path/name`, resolved from the root.
    pub fn subscribe_to_broadcast_in(
        &self,
        path: &str,
        name: &str,
        handler: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> Result<Arc<Subscription>> {
        let subscription = match self.lookup(path, name, CommunicationKind::Broadcast)? {
            Communication::Broadcast(broadcast) => broadcast.subscribe(handler),
            _ => unreachable!("lookup checked the kind"),
        };
        self.shared
            .subscriptions
            .lock()
            .push(Arc::downgrade(&subscription));
        Ok(subscription)
    }

    // Streams =================================================================

    /// Register a stream template whose entry handler runs once per session.
    pub fn create_stream(
        &self,
        name: &str,
        entry: impl Fn(super::stream::Stream) + Send + Sync + 'static,
    ) -> Result<()> {
        self.register(
            name,
            Communication::Stream(Arc::new(StreamCommunication::new(entry))),
        )
        .map(|_| ())
    }

    /// Open a session against a stream registered in the global namespace.
    pub fn open_stream(
        &self,
        name: &str,
        session: impl FnOnce(super::stream::Stream) + Send + 'static,
    ) -> Result<StreamSession> {
        self.open_stream_in("/", name, session)
    }

    /// Open a session against the stream template at `path/name`.
    pub fn open_stream_in(
        &self,
        path: &str,
        name: &str,
        session: impl FnOnce(super::stream::Stream) + Send + 'static,
    ) -> Result<StreamSession> {
        match self.lookup(path, name, CommunicationKind::Stream)? {
            Communication::Stream(stream) => Ok(stream.open(session)),
            _ => unreachable!("lookup checked the kind"),
        }
    }

    // Extension points ========================================================

    /// Publish an extension point under the capability's declared name.
    pub fn create_extension_point(&self, spec: CapabilitySpec) -> Result<()> {
        let name = spec.name.clone();
        self.register(
            &name,
            Communication::ExtensionPoint(Arc::new(ExtensionPointCommunication::new(spec))),
        )
        .map(|_| ())
    }

    /// Register an implementor on the extension point at `path/name`.
    ///
    /// The implementor stays in the point's live list until the module that
    /// registered it unloads.
    pub fn implement_extension(
        &self,
        path: &str,
        name: &str,
        implementor: Implementor,
    ) -> Result<Arc<Implementor>> {
        let point = match self.lookup(path, name, CommunicationKind::ExtensionPoint)? {
            Communication::ExtensionPoint(point) => point,
            _ => unreachable!("lookup checked the kind"),
        };
        let implementor = point.register(implementor)?;
        self.shared
            .implementors
            .lock()
            .push((Arc::downgrade(&point), Arc::downgrade(&implementor)));
        Ok(implementor)
    }

    /// Live view over the extension point named `capability` in the current
    /// namespace, or `None` when no such extension point exists.
    pub fn retrieve_extensions(&self, capability: &str) -> Option<ExtensionPointHandle> {
        match self.namespace.get(capability)? {
            Communication::ExtensionPoint(point) => Some(ExtensionPointHandle::new(point)),
            _ => None,
        }
    }

    // Flags ===================================================================

    /// Claim exclusive query rights over `flag`.
    ///
    /// Claiming an already-claimed flag is an error; the claim token is held
    /// by this context (and its nested contexts) until the module unloads.
    pub fn claim_flag(&self, flag: &str) -> Result<()> {
        let token = self
            .flags
            .claim(flag)
            .ok_or_else(|| CommunicationError::FlagAlreadyClaimed(flag.to_string()))?;
        self.shared
            .claimed_flags
            .lock()
            .insert(flag.to_string(), token);
        Ok(())
    }

    /// Namespace ids of every module advertising `flag`.
    ///
    /// Only valid after a successful [`claim_flag`](Self::claim_flag) by this
    /// context.
    pub fn flag_namespaces(&self, flag: &str) -> Result<Vec<String>> {
        let claimed = self.shared.claimed_flags.lock();
        let token = claimed
            .get(flag)
            .ok_or_else(|| CommunicationError::IllegalFlagAccess(flag.to_string()))?;
        self.flags
            .namespaces_with(flag, token)
            .ok_or_else(|| CommunicationError::IllegalFlagAccess(flag.to_string()))
    }

    // Introspection ===========================================================

    /// Kind of the entry `name` under `path`, resolved relative to this
    /// context's namespace. `None` when either is absent.
    pub fn communication_kind(&self, path: &str, name: &str) -> Option<CommunicationKind> {
        self.resolver
            .resolve(path, Some(&self.namespace))?
            .get(name)
            .map(|c| c.kind())
    }

    // Internals ===============================================================

    fn scoped(&self, namespace: Arc<Namespace>) -> CommunicationContext {
        CommunicationContext {
            resolver: self.resolver.clone(),
            flags: self.flags.clone(),
            namespace,
            idempotent: self.idempotent,
            shared: self.shared.clone(),
        }
    }

    /// Insert an entry; under idempotent mode a same-kind duplicate keeps the
    /// original and is returned instead.
    fn register(&self, name: &str, communication: Communication) -> Result<Option<Communication>> {
        let kind = communication.kind();
        match self.namespace.insert(name, communication) {
            Ok(()) => Ok(None),
            Err(CommunicationError::AlreadyDefined { kind: existing, .. })
                if self.idempotent && existing == kind =>
            {
                Ok(self.namespace.get(name))
            }
            Err(err) => Err(err),
        }
    }

    fn lookup(&self, path: &str, name: &str, expected: CommunicationKind) -> Result<Communication> {
        let namespace = self
            .resolver
            .resolve(path, None)
            .ok_or_else(|| CommunicationError::NamespaceNotFound(path.to_string()))?;
        let communication = namespace
            .get(name)
            .ok_or_else(|| CommunicationError::NotDefined {
                kind: expected,
                name: name.to_string(),
            })?;
        if communication.kind() != expected {
            return Err(CommunicationError::KindMismatch {
                name: name.to_string(),
                expected,
                actual: communication.kind(),
            });
        }
        Ok(communication)
    }

    /// Retract everything this context registered outside its namespace:
    /// cancel subscriptions, drop implementors, release flag claims. The
    /// namespace subtree itself is deleted by the module runtime.
    pub(crate) fn cleanup(&self) {
        for subscription in self.shared.subscriptions.lock().drain(..) {
            if let Some(subscription) = subscription.upgrade() {
                subscription.unsubscribe();
            }
        }
        for (point, implementor) in self.shared.implementors.lock().drain(..) {
            if let (Some(point), Some(implementor)) = (point.upgrade(), implementor.upgrade()) {
                point.remove(&implementor);
            }
        }
        for (flag, token) in self.shared.claimed_flags.lock().drain() {
            self.flags.release(&flag, &token);
        }
    }
}

impl std::fmt::Debug for CommunicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommunicationContext")
            .field("namespace", &self.namespace_path())
            .field("idempotent", &self.idempotent)
            .finish()
    }
}
