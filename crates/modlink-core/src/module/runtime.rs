//! Module lifecycle runtime.
//!
//! One [`ModuleRuntime`] owns the whole of a process's inter-module state:
//! the namespace tree, the flag registry and the set of loaded modules.
//! Nothing here is a process-wide global — tests and embedders construct as
//! many isolated runtimes as they like.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::dependency::DependencyResolver;
use super::descriptor::ModuleDescriptor;
use super::{Module, ModuleError, ModuleSource, Result};
use crate::communication::CommunicationContext;
use crate::flags::FlagRegistry;
use crate::namespace::NamespaceResolver;

/// A live module together with the state created for it at load time.
struct LoadedModule {
    descriptor: ModuleDescriptor,
    instance: Arc<dyn Module>,
    context: Arc<CommunicationContext>,
    namespace_path: String,
    loaded_at: DateTime<Utc>,
}

/// Owner of the namespace tree, flag registry and loaded-module set.
pub struct ModuleRuntime {
    resolver: Arc<NamespaceResolver>,
    flags: Arc<FlagRegistry>,
    modules: RwLock<HashMap<String, LoadedModule>>,
}

impl ModuleRuntime {
    pub fn new() -> Self {
        Self {
            resolver: Arc::new(NamespaceResolver::new()),
            flags: Arc::new(FlagRegistry::new()),
            modules: RwLock::new(HashMap::new()),
        }
    }

    pub fn resolver(&self) -> &Arc<NamespaceResolver> {
        &self.resolver
    }

    pub fn flags(&self) -> &Arc<FlagRegistry> {
        &self.flags
    }

    /// Communication context for the host application itself.
    ///
    /// The host context is scoped to the root namespace and registers
    /// idempotently, since the host may run its registration block again
    /// whenever its own lifecycle restarts it.
    pub fn host_context(&self) -> CommunicationContext {
        CommunicationContext::new(
            self.resolver.clone(),
            self.flags.clone(),
            self.resolver.root().clone(),
            true,
        )
    }

    /// Load one module, reporting failures through `errors`.
    ///
    /// Loading an already-loaded id is a no-op. Failures — instantiation,
    /// invalid or colliding namespace, a load hook error — are reported as
    /// human-readable strings so a batch load can carry on with the
    /// remaining modules.
    pub fn load(
        &self,
        descriptor: &ModuleDescriptor,
        source: &dyn ModuleSource,
        errors: &mut dyn FnMut(String),
    ) {
        if self.is_loaded(&descriptor.id) {
            return;
        }

        let instance: Arc<dyn Module> = match source.instantiate(descriptor) {
            Ok(instance) => Arc::from(instance),
            Err(err) => {
                errors(format!("error while loading module {:?}: {err}", descriptor.name));
                return;
            }
        };

        let namespace_id = instance.namespace_id().to_string();
        let namespace = match self.resolver.create_namespace("/", &namespace_id, None) {
            Ok(namespace) => namespace,
            Err(crate::communication::CommunicationError::AlreadyDefined { .. }) => {
                errors(
                    ModuleError::NamespaceCollision(namespace_id.clone()).to_string(),
                );
                return;
            }
            Err(err) => {
                errors(format!("error while loading module {:?}: {err}", descriptor.name));
                return;
            }
        };

        let context = Arc::new(CommunicationContext::new(
            self.resolver.clone(),
            self.flags.clone(),
            namespace.clone(),
            false,
        ));

        for flag in instance.flags() {
            self.flags.advertise(&flag, &namespace_id);
        }

        if let Err(err) = instance.on_loaded(&context) {
            errors(format!("error while loading module {:?}: {err}", descriptor.name));
            context.cleanup();
            self.flags.retract(&namespace_id);
            self.resolver.delete_namespace(&namespace.full_path(), None);
            return;
        }

        tracing::info!(id = %descriptor.id, namespace = %namespace_id, "module loaded");
        self.modules.write().insert(
            descriptor.id.clone(),
            LoadedModule {
                descriptor: descriptor.clone(),
                instance,
                context,
                namespace_path: namespace.full_path(),
                loaded_at: Utc::now(),
            },
        );
    }

    /// Order a batch by its dependencies and load it.
    ///
    /// A dependency error (missing or cyclic) is fatal to the whole batch —
    /// nothing is loaded. Per-module failures flow through `errors` and the
    /// batch continues. Finishes by firing the all-loaded hook on every
    /// loaded module.
    pub fn load_modules(
        &self,
        descriptors: Vec<ModuleDescriptor>,
        source: &dyn ModuleSource,
        errors: &mut dyn FnMut(String),
    ) -> Result<()> {
        let enabled = descriptors.into_iter().filter(|d| d.enabled).collect();
        let order = DependencyResolver::new(enabled, self.loaded_keys()).order()?;

        for descriptor in &order {
            self.load(descriptor, source, errors);
        }

        self.finish_load_modules();
        Ok(())
    }

    /// Fire the all-loaded hook on every currently loaded module.
    pub fn finish_load_modules(&self) {
        let snapshot: Vec<(Arc<dyn Module>, Arc<CommunicationContext>)> = self
            .modules
            .read()
            .values()
            .map(|m| (m.instance.clone(), m.context.clone()))
            .collect();

        for (instance, context) in snapshot {
            instance.on_all_loaded(&context);
        }
    }

    /// Unload one module and excise everything it registered.
    pub fn unload(&self, id: &str) -> Result<()> {
        let module = self
            .modules
            .write()
            .remove(id)
            .ok_or_else(|| ModuleError::NotLoaded(id.to_string()))?;

        module.instance.on_unloaded(&module.context);
        module.context.cleanup();
        self.flags.retract(module.instance.namespace_id());
        self.resolver.delete_namespace(&module.namespace_path, None);

        tracing::info!(id, "module unloaded");
        Ok(())
    }

    /// Unload every loaded module, in no particular order.
    pub fn unload_all(&self) {
        for id in self.list_loaded() {
            let _ = self.unload(&id);
        }
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.modules.read().contains_key(id)
    }

    /// Ids of the currently loaded modules.
    pub fn list_loaded(&self) -> Vec<String> {
        self.modules.read().keys().cloned().collect()
    }

    /// Descriptor of a loaded module.
    pub fn descriptor(&self, id: &str) -> Option<ModuleDescriptor> {
        self.modules.read().get(id).map(|m| m.descriptor.clone())
    }

    /// When a loaded module was loaded.
    pub fn loaded_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.modules.read().get(id).map(|m| m.loaded_at)
    }

    fn loaded_keys(&self) -> Vec<String> {
        self.modules
            .read()
            .values()
            .map(|m| m.descriptor.key())
            .collect()
    }
}

impl Default for ModuleRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::communication::value::Value;
    use parking_lot::Mutex;

    /// Test module recording its lifecycle into a shared event log.
    struct TestModule {
        namespace: String,
        flags: Vec<String>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Module for TestModule {
        fn namespace_id(&self) -> &str {
            &self.namespace
        }

        fn flags(&self) -> Vec<String> {
            self.flags.clone()
        }

        fn on_loaded(&self, context: &CommunicationContext) -> Result<()> {
            self.log.lock().push(format!("load {}", self.namespace));
            let namespace = self.namespace.clone();
            context.create_function("whoami", move |_| {
                Ok(Some(Value::from(namespace.as_str())))
            })?;
            Ok(())
        }

        fn on_unloaded(&self, _context: &CommunicationContext) {
            self.log.lock().push(format!("unload {}", self.namespace));
        }

        fn on_all_loaded(&self, _context: &CommunicationContext) {
            self.log.lock().push(format!("all-loaded {}", self.namespace));
        }
    }

    /// Source producing `TestModule`s named after the descriptor id.
    struct TestSource {
        log: Arc<Mutex<Vec<String>>>,
        /// ids that fail to instantiate
        broken: Vec<String>,
        /// id -> namespace override (defaults to the id)
        namespaces: HashMap<String, String>,
    }

    impl TestSource {
        fn new(log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                log: log.clone(),
                broken: Vec::new(),
                namespaces: HashMap::new(),
            }
        }
    }

    impl ModuleSource for TestSource {
        fn instantiate(&self, descriptor: &ModuleDescriptor) -> Result<Box<dyn Module>> {
            if self.broken.contains(&descriptor.id) {
                return Err(ModuleError::Instantiation {
                    id: descriptor.id.clone(),
                    reason: "broken on purpose".to_string(),
                });
            }
            let namespace = self
                .namespaces
                .get(&descriptor.id)
                .cloned()
                .unwrap_or_else(|| descriptor.id.clone());
            Ok(Box::new(TestModule {
                namespace,
                flags: if descriptor.id == "flagged" {
                    vec!["telemetry".to_string()]
                } else {
                    Vec::new()
                },
                log: self.log.clone(),
            }))
        }
    }

    fn descriptor(name: &str, dependencies: &[&str]) -> ModuleDescriptor {
        ModuleDescriptor {
            id: name.to_lowercase(),
            name: name.to_string(),
            description: String::new(),
            version: "1.0.0".to_string(),
            author: "test".to_string(),
            website: None,
            entry: format!("{}::Module", name.to_lowercase()),
            archive: "module.jar".to_string(),
            enabled: true,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn test_load_and_invoke() {
        let runtime = ModuleRuntime::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = TestSource::new(&log);
        let mut errors = Vec::new();

        runtime.load(&descriptor("A", &[]), &source, &mut |e| errors.push(e));

        assert!(errors.is_empty());
        assert!(runtime.is_loaded("a"));
        assert!(runtime.loaded_at("a").is_some());

        let host = runtime.host_context();
        let out = host
            .invoke_function_in("/a", "whoami", &args! {})
            .unwrap();
        assert_eq!(out, Some(Value::from("a")));
    }

    #[test]
    fn test_load_is_a_no_op_when_already_loaded() {
        let runtime = ModuleRuntime::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = TestSource::new(&log);
        let mut errors = Vec::new();

        let a = descriptor("A", &[]);
        runtime.load(&a, &source, &mut |e| errors.push(e));
        runtime.load(&a, &source, &mut |e| errors.push(e));

        assert!(errors.is_empty());
        assert_eq!(log.lock().iter().filter(|l| *l == "load a").count(), 1);
    }

    #[test]
    fn test_namespace_collision_reported_through_sink() {
        let runtime = ModuleRuntime::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut source = TestSource::new(&log);
        source.namespaces.insert("b".to_string(), "a".to_string());
        let mut errors = Vec::new();

        runtime.load(&descriptor("A", &[]), &source, &mut |e| errors.push(e));
        runtime.load(&descriptor("B", &[]), &source, &mut |e| errors.push(e));

        // the first module stays active, the second fails to load
        assert!(runtime.is_loaded("a"));
        assert!(!runtime.is_loaded("b"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("\"a\""), "got: {}", errors[0]);
    }

    #[test]
    fn test_instantiation_failure_does_not_stop_the_batch() {
        let runtime = ModuleRuntime::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut source = TestSource::new(&log);
        source.broken.push("a".to_string());
        let mut errors = Vec::new();

        runtime
            .load_modules(
                vec![descriptor("A", &[]), descriptor("B", &[])],
                &source,
                &mut |e| errors.push(e),
            )
            .unwrap();

        assert!(!runtime.is_loaded("a"));
        assert!(runtime.is_loaded("b"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_batch_load_orders_dependencies_and_fires_all_loaded() {
        let runtime = ModuleRuntime::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = TestSource::new(&log);
        let mut errors = Vec::new();

        runtime
            .load_modules(
                vec![
                    descriptor("C", &["B:1.0.0"]),
                    descriptor("A", &[]),
                    descriptor("B", &["A:1.0.0"]),
                ],
                &source,
                &mut |e| errors.push(e),
            )
            .unwrap();

        assert!(errors.is_empty());
        let log = log.lock();
        let loads: Vec<&String> = log.iter().filter(|l| l.starts_with("load ")).collect();
        assert_eq!(loads, ["load a", "load b", "load c"]);
        // the all-loaded hook fired once per module, after every load
        assert_eq!(
            log.iter().filter(|l| l.starts_with("all-loaded ")).count(),
            3
        );
        assert!(log.iter().position(|l| l.starts_with("all-loaded")).unwrap() > 2);
    }

    #[test]
    fn test_missing_dependency_aborts_whole_batch() {
        let runtime = ModuleRuntime::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = TestSource::new(&log);
        let mut errors = Vec::new();

        let result = runtime.load_modules(
            vec![descriptor("A", &[]), descriptor("B", &["Ghost:1.0.0"])],
            &source,
            &mut |e| errors.push(e),
        );

        assert!(matches!(
            result,
            Err(ModuleError::DependencyNotFound { .. })
        ));
        // no partial application
        assert!(runtime.list_loaded().is_empty());
    }

    #[test]
    fn test_disabled_modules_are_not_loaded() {
        let runtime = ModuleRuntime::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = TestSource::new(&log);
        let mut disabled = descriptor("A", &[]);
        disabled.enabled = false;

        runtime
            .load_modules(vec![disabled], &source, &mut |_| {})
            .unwrap();

        assert!(runtime.list_loaded().is_empty());
    }

    #[test]
    fn test_unload_tears_namespace_down() {
        let runtime = ModuleRuntime::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = TestSource::new(&log);

        runtime.load(&descriptor("A", &[]), &source, &mut |_| {});
        runtime.unload("a").unwrap();

        assert!(!runtime.is_loaded("a"));
        assert!(log.lock().contains(&"unload a".to_string()));
        assert!(runtime.resolver().resolve("/a", None).is_none());

        let host = runtime.host_context();
        assert!(host.invoke_function_in("/a", "whoami", &args! {}).is_err());

        // a second unload errors, the namespace deletion below it would not
        assert!(matches!(
            runtime.unload("a"),
            Err(ModuleError::NotLoaded(_))
        ));
    }

    #[test]
    fn test_unload_retracts_flag_advertisements() {
        let runtime = ModuleRuntime::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = TestSource::new(&log);

        runtime.load(&descriptor("Flagged", &[]), &source, &mut |_| {});

        let host = runtime.host_context();
        host.claim_flag("telemetry").unwrap();
        assert_eq!(
            host.flag_namespaces("telemetry").unwrap(),
            vec!["flagged".to_string()]
        );

        runtime.unload("flagged").unwrap();
        assert!(host.flag_namespaces("telemetry").unwrap().is_empty());
    }

    #[test]
    fn test_unload_all() {
        let runtime = ModuleRuntime::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = TestSource::new(&log);

        runtime
            .load_modules(
                vec![descriptor("A", &[]), descriptor("B", &[])],
                &source,
                &mut |_| {},
            )
            .unwrap();
        runtime.unload_all();

        assert!(runtime.list_loaded().is_empty());
        assert!(runtime.resolver().resolve("/a", None).is_none());
        assert!(runtime.resolver().resolve("/b", None).is_none());
    }

    #[test]
    fn test_failed_load_hook_rolls_back() {
        struct FailingModule;
        impl Module for FailingModule {
            fn namespace_id(&self) -> &str {
                "failing"
            }
            fn on_loaded(&self, _context: &CommunicationContext) -> Result<()> {
                Err(ModuleError::Instantiation {
                    id: "failing".to_string(),
                    reason: "load hook refused".to_string(),
                })
            }
            fn on_unloaded(&self, _context: &CommunicationContext) {}
        }

        struct FailingSource;
        impl ModuleSource for FailingSource {
            fn instantiate(&self, _d: &ModuleDescriptor) -> Result<Box<dyn Module>> {
                Ok(Box::new(FailingModule))
            }
        }

        let runtime = ModuleRuntime::new();
        let mut errors = Vec::new();
        runtime.load(&descriptor("F", &[]), &FailingSource, &mut |e| {
            errors.push(e)
        });

        assert!(!runtime.is_loaded("f"));
        assert_eq!(errors.len(), 1);
        // the half-created namespace was torn down again
        assert!(runtime.resolver().resolve("/failing", None).is_none());
    }
}
