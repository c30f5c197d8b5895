//! Extension point communications.
//!
//! An extension point publishes a capability contract — a named set of method
//! signatures — that any number of modules may implement. Implementors are
//! collected in a shared, live list: consumers observe additions and removals
//! over time, and an implementor disappears only when its providing module
//! unloads.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::error::{CommunicationError, Result};
use super::value::{Arguments, Value, ValueType};
use super::{CommunicationKind, FunctionHandler};

/// Signature of one method in a capability contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub name: String,
    /// `None` means the method returns nothing.
    pub returns: Option<ValueType>,
    /// Ordered parameter type tags.
    pub parameters: Vec<ValueType>,
}

impl MethodSpec {
    pub fn new(name: impl Into<String>, returns: Option<ValueType>, parameters: Vec<ValueType>) -> Self {
        Self {
            name: name.into(),
            returns,
            parameters,
        }
    }
}

impl std::fmt::Display for MethodSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "method {:?}, returns: ", self.name)?;
        match &self.returns {
            Some(t) => write!(f, "{t}")?,
            None => f.write_str("nothing")?,
        }
        f.write_str(", parameters: ")?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

/// A named capability contract: the extension point's declared surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySpec {
    pub name: String,
    pub methods: Vec<MethodSpec>,
}

impl CapabilitySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Builder-style method declaration.
    pub fn method(
        mut self,
        name: impl Into<String>,
        returns: Option<ValueType>,
        parameters: Vec<ValueType>,
    ) -> Self {
        self.methods.push(MethodSpec::new(name, returns, parameters));
        self
    }
}

/// One module's implementation of a capability contract.
pub struct Implementor {
    provider: String,
    methods: HashMap<String, FunctionHandler>,
}

impl Implementor {
    /// `provider` is the namespace id of the module supplying the handlers.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            methods: HashMap::new(),
        }
    }

    /// Builder-style handler registration for one contract method.
    pub fn method(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&Arguments) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Box::new(handler));
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Invoke one contract method synchronously on the calling thread.
    pub fn invoke(&self, method: &str, args: &Arguments) -> Result<Option<Value>> {
        let handler = self.methods.get(method).ok_or_else(|| {
            CommunicationError::NotDefined {
                kind: CommunicationKind::Function,
                name: method.to_string(),
            }
        })?;
        handler(args)
    }
}

impl std::fmt::Debug for Implementor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Implementor")
            .field("provider", &self.provider)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An extension point entry: the contract plus its live implementor list.
pub struct ExtensionPointCommunication {
    spec: CapabilitySpec,
    implementors: RwLock<Vec<Arc<Implementor>>>,
}

impl ExtensionPointCommunication {
    pub fn new(spec: CapabilitySpec) -> Self {
        Self {
            spec,
            implementors: RwLock::new(Vec::new()),
        }
    }

    pub fn spec(&self) -> &CapabilitySpec {
        &self.spec
    }

    /// Register an implementor after checking it covers every contract method.
    pub fn register(&self, implementor: Implementor) -> Result<Arc<Implementor>> {
        for method in &self.spec.methods {
            if !implementor.methods.contains_key(&method.name) {
                return Err(CommunicationError::ImplementorMismatch {
                    point: self.spec.name.clone(),
                    method: method.name.clone(),
                });
            }
        }
        let implementor = Arc::new(implementor);
        self.implementors.write().push(implementor.clone());
        Ok(implementor)
    }

    /// Snapshot of the current implementors, in registration order.
    pub fn implementors(&self) -> Vec<Arc<Implementor>> {
        self.implementors.read().clone()
    }

    /// Drop one implementor by identity. Used when its module unloads.
    pub(crate) fn remove(&self, implementor: &Arc<Implementor>) {
        self.implementors
            .write()
            .retain(|i| !Arc::ptr_eq(i, implementor));
    }
}

impl std::fmt::Debug for ExtensionPointCommunication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionPointCommunication")
            .field("spec", &self.spec.name)
            .field("implementors", &self.implementors.read().len())
            .finish()
    }
}

/// Shared view over an extension point handed to consumers.
///
/// The implementor list is live: calling [`implementors`](Self::implementors)
/// again after other modules load or unload reflects the changes.
#[derive(Clone, Debug)]
pub struct ExtensionPointHandle {
    inner: Arc<ExtensionPointCommunication>,
}

impl ExtensionPointHandle {
    pub fn new(inner: Arc<ExtensionPointCommunication>) -> Self {
        Self { inner }
    }

    pub fn spec(&self) -> &CapabilitySpec {
        self.inner.spec()
    }

    pub fn implementors(&self) -> Vec<Arc<Implementor>> {
        self.inner.implementors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    fn greeter_spec() -> CapabilitySpec {
        CapabilitySpec::new("greeter").method(
            "greet",
            Some(ValueType::String),
            vec![ValueType::String],
        )
    }

    #[test]
    fn test_register_validates_contract() {
        let point = ExtensionPointCommunication::new(greeter_spec());

        let err = point.register(Implementor::new("mod-a")).unwrap_err();
        assert!(matches!(
            err,
            CommunicationError::ImplementorMismatch { point, method }
                if point == "greeter" && method == "greet"
        ));
    }

    #[test]
    fn test_invoke_implementor() {
        let point = ExtensionPointCommunication::new(greeter_spec());
        let implementor = point
            .register(Implementor::new("mod-a").method("greet", |args| {
                let who = args.get_str("who")?;
                Ok(Some(Value::from(format!("hello {who}"))))
            }))
            .unwrap();

        let out = implementor.invoke("greet", &args! { "who" => "world" }).unwrap();
        assert_eq!(out, Some(Value::from("hello world")));

        assert!(matches!(
            implementor.invoke("missing", &Arguments::new()),
            Err(CommunicationError::NotDefined { .. })
        ));
    }

    #[test]
    fn test_implementor_list_is_live() {
        let point = Arc::new(ExtensionPointCommunication::new(greeter_spec()));
        let handle = ExtensionPointHandle::new(point.clone());
        assert!(handle.implementors().is_empty());

        let implementor = point
            .register(Implementor::new("mod-a").method("greet", |_| Ok(None)))
            .unwrap();
        assert_eq!(handle.implementors().len(), 1);
        assert_eq!(handle.implementors()[0].provider(), "mod-a");

        point.remove(&implementor);
        assert!(handle.implementors().is_empty());
    }

    #[test]
    fn test_method_spec_display() {
        let spec = MethodSpec::new(
            "greet",
            Some(ValueType::String),
            vec![ValueType::String, ValueType::Integer],
        );
        assert_eq!(
            spec.to_string(),
            "method \"greet\", returns: string, parameters: string, integer"
        );
    }
}
