//! Communication registry entries.
//!
//! A namespace stores its registry inline as a map from local name to
//! [`Communication`]. The five entry kinds cover everything a module can
//! publish: callable functions, broadcasts, stream templates, extension
//! points and nested namespaces.

pub mod broadcast;
pub mod context;
pub mod error;
pub mod extension_point;
pub mod stream;
pub mod value;

use std::sync::Arc;

use crate::namespace::Namespace;
use broadcast::BroadcastCommunication;
use extension_point::ExtensionPointCommunication;
use stream::StreamCommunication;

pub use context::CommunicationContext;
pub use error::{CommunicationError, Result};
pub use value::{Arguments, Value, ValueType};

/// Handler backing a function communication.
///
/// Invocation is synchronous and runs on the invoking caller's thread.
pub type FunctionHandler = Box<dyn Fn(&Arguments) -> Result<Option<Value>> + Send + Sync>;

/// A function entry: a name bound to a handler, stateless beyond its closure.
pub struct FunctionCommunication {
    handler: FunctionHandler,
}

impl FunctionCommunication {
    pub fn new(
        handler: impl Fn(&Arguments) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// Run the handler on the calling thread.
    pub fn invoke(&self, args: &Arguments) -> Result<Option<Value>> {
        (self.handler)(args)
    }
}

impl std::fmt::Debug for FunctionCommunication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCommunication").finish_non_exhaustive()
    }
}

/// Any entry registrable under a name inside a namespace.
#[derive(Debug, Clone)]
pub enum Communication {
    Function(Arc<FunctionCommunication>),
    Broadcast(Arc<BroadcastCommunication>),
    Stream(Arc<StreamCommunication>),
    ExtensionPoint(Arc<ExtensionPointCommunication>),
    Namespace(Arc<Namespace>),
}

impl Communication {
    pub fn kind(&self) -> CommunicationKind {
        match self {
            Communication::Function(_) => CommunicationKind::Function,
            Communication::Broadcast(_) => CommunicationKind::Broadcast,
            Communication::Stream(_) => CommunicationKind::Stream,
            Communication::ExtensionPoint(_) => CommunicationKind::ExtensionPoint,
            Communication::Namespace(_) => CommunicationKind::Namespace,
        }
    }

    /// The nested namespace, if this entry is one.
    pub fn as_namespace(&self) -> Option<&Arc<Namespace>> {
        match self {
            Communication::Namespace(ns) => Some(ns),
            _ => None,
        }
    }
}

/// Kind tag used in error messages and introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommunicationKind {
    Function,
    Broadcast,
    Stream,
    ExtensionPoint,
    Namespace,
}

impl std::fmt::Display for CommunicationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CommunicationKind::Function => "function",
            CommunicationKind::Broadcast => "broadcast",
            CommunicationKind::Stream => "stream",
            CommunicationKind::ExtensionPoint => "extension point",
            CommunicationKind::Namespace => "namespace",
        };
        f.write_str(name)
    }
}

/// Whether `name` satisfies the communication-name grammar `[A-Za-z0-9\-_+]+`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_grammar() {
        assert!(is_valid_name("clock"));
        assert!(is_valid_name("a-b_c+d9"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("path/name"));
        assert!(!is_valid_name("ünicode"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CommunicationKind::Function.to_string(), "function");
        assert_eq!(
            CommunicationKind::ExtensionPoint.to_string(),
            "extension point"
        );
    }

    #[test]
    fn test_function_invoke() {
        let f = FunctionCommunication::new(|args| {
            let n = args.get_integer("n")?;
            Ok(Some(Value::Integer(n * 2)))
        });

        let out = f.invoke(&crate::args! { "n" => 21 }).unwrap();
        assert_eq!(out, Some(Value::Integer(42)));
    }
}
