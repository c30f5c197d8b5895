//! Compiled-in module registration.
//!
//! The runtime obtains module instances through the `ModuleSource`
//! capability; this module provides the statically linked flavor. Each
//! registered constructor is keyed by the entry reference a descriptor
//! carries, so the same descriptors drive both dynamically and statically
//! delivered modules.

use std::collections::HashMap;

use modlink_core::module::Result;
use modlink_core::{Module, ModuleDescriptor, ModuleError, ModuleSource};

/// A module type registrable with [`StaticModuleSource::with_module`].
///
/// Implemented by hand or through [`declare_module!`](crate::declare_module).
pub trait StaticModule: Module + Default + 'static {
    /// Entry reference matching [`ModuleDescriptor::entry`].
    const ENTRY: &'static str;
}

/// [`ModuleSource`] over a table of compiled-in constructors.
#[derive(Default)]
pub struct StaticModuleSource {
    constructors: HashMap<String, Box<dyn Fn() -> Box<dyn Module> + Send + Sync>>,
}

impl StaticModuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under an entry reference.
    pub fn register(
        &mut self,
        entry: impl Into<String>,
        constructor: impl Fn() -> Box<dyn Module> + Send + Sync + 'static,
    ) {
        self.constructors.insert(entry.into(), Box::new(constructor));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        entry: impl Into<String>,
        constructor: impl Fn() -> Box<dyn Module> + Send + Sync + 'static,
    ) -> Self {
        self.register(entry, constructor);
        self
    }

    /// Register a [`StaticModule`] type under its declared entry.
    pub fn with_module<M: StaticModule>(self) -> Self {
        self.with(M::ENTRY, || Box::new(M::default()))
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl ModuleSource for StaticModuleSource {
    fn instantiate(&self, descriptor: &ModuleDescriptor) -> Result<Box<dyn Module>> {
        let constructor = self.constructors.get(&descriptor.entry).ok_or_else(|| {
            ModuleError::Instantiation {
                id: descriptor.id.clone(),
                reason: format!(
                    "no compiled-in module registered for entry {:?}",
                    descriptor.entry
                ),
            }
        })?;
        Ok(constructor())
    }
}

impl std::fmt::Debug for StaticModuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticModuleSource")
            .field("entries", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modlink_core::CommunicationContext;

    #[derive(Default)]
    struct NullModule;

    impl Module for NullModule {
        fn namespace_id(&self) -> &str {
            "null"
        }
        fn on_loaded(&self, _context: &CommunicationContext) -> Result<()> {
            Ok(())
        }
        fn on_unloaded(&self, _context: &CommunicationContext) {}
    }

    impl StaticModule for NullModule {
        const ENTRY: &'static str = "null::NullModule";
    }

    fn descriptor(entry: &str) -> ModuleDescriptor {
        ModuleDescriptor {
            id: "null".to_string(),
            name: "Null".to_string(),
            description: String::new(),
            version: "1.0.0".to_string(),
            author: "test".to_string(),
            website: None,
            entry: entry.to_string(),
            archive: "module.jar".to_string(),
            enabled: true,
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn test_instantiate_registered_module() {
        let source = StaticModuleSource::new().with_module::<NullModule>();

        let module = source.instantiate(&descriptor(NullModule::ENTRY)).unwrap();
        assert_eq!(module.namespace_id(), "null");
    }

    #[test]
    fn test_unknown_entry_is_an_error() {
        let source = StaticModuleSource::new();

        assert!(matches!(
            source.instantiate(&descriptor("ghost::Module")),
            Err(ModuleError::Instantiation { .. })
        ));
    }
}
