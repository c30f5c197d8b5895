//! Module contract, lifecycle and dependency ordering.

pub mod dependency;
pub mod descriptor;
pub mod runtime;

use crate::communication::{CommunicationContext, CommunicationError};

pub use dependency::DependencyResolver;
pub use descriptor::{ModuleDescriptor, ModuleManifest, RUNTIME_VERSION};
pub use runtime::ModuleRuntime;

/// Contract every loadable module implements.
///
/// How a `Module`-shaped object is produced — dynamic library, subprocess
/// bridge, compiled-in registration — is the [`ModuleSource`]'s concern; the
/// runtime only sees this trait.
pub trait Module: Send + Sync {
    /// Namespace identifier under which this module's communications live.
    /// Must satisfy the communication-name grammar and be unique at root.
    fn namespace_id(&self) -> &str;

    /// Capability flags this module advertises possessing.
    fn flags(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called once after the module's namespace and context exist.
    ///
    /// This is where the module registers its communications. An error here
    /// aborts the load and tears the namespace down again.
    fn on_loaded(&self, context: &CommunicationContext) -> Result<()>;

    /// Called when the module is about to be unloaded. Best effort; the
    /// namespace subtree is excised afterwards regardless.
    fn on_unloaded(&self, context: &CommunicationContext);

    /// Called once after an entire batch load completed, when every peer
    /// module is guaranteed present. Cross-module discovery belongs here.
    fn on_all_loaded(&self, _context: &CommunicationContext) {}
}

/// Capability producing module instances from descriptors.
pub trait ModuleSource: Send + Sync {
    fn instantiate(&self, descriptor: &ModuleDescriptor) -> Result<Box<dyn Module>>;
}

/// Errors surfaced by module loading, unloading and ordering.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModuleError {
    /// A declared dependency is neither installed nor already running.
    #[error("module {module:?} depends on {dependency:?} but it cannot be found")]
    DependencyNotFound { module: String, dependency: String },

    /// The declared dependencies form a cycle.
    #[error("dependency cycle detected: {}", chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },

    /// Another loaded module already owns the declared namespace id.
    #[error("namespace {0:?} is already taken by another module")]
    NamespaceCollision(String),

    /// The module id is not currently loaded.
    #[error("module {0:?} is not loaded")]
    NotLoaded(String),

    /// The module was built against an incompatible runtime version.
    #[error("module requires runtime {required}, which is incompatible with {current}")]
    IncompatibleRuntime { required: String, current: String },

    /// The module source could not produce an instance.
    #[error("failed to instantiate module {id:?}: {reason}")]
    Instantiation { id: String, reason: String },

    /// The package manifest could not be understood.
    #[error("invalid module manifest: {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    Communication(#[from] CommunicationError),
}

pub type Result<T> = std::result::Result<T, ModuleError>;
