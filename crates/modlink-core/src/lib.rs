//! Core runtime for modlink.
//!
//! Independently built modules are loaded into a host process and exposed to
//! each other through a namespaced communication registry: remote-callable
//! functions, pub/sub broadcasts, bidirectional streams, extension points
//! and capability flags, all addressed by `/`-separated paths resolved at
//! runtime.
//!
//! Everything is in-process and synchronous: invoking a function runs its
//! handler on the calling thread, a broadcast fans out on the broadcasting
//! thread, and only a stream's blocking receive ever parks a thread.
//!
//! # Quick start
//!
//! ```
//! use modlink_core::prelude::*;
//!
//! let runtime = ModuleRuntime::new();
//! let host = runtime.host_context();
//!
//! host.create_function("greet", |args| {
//!     let who = args.get_str("who")?;
//!     Ok(Some(Value::from(format!("hello {who}"))))
//! })?;
//!
//! let out = host.invoke_function("greet", &modlink_core::args! { "who" => "world" })?;
//! assert_eq!(out, Some(Value::from("hello world")));
//! # Ok::<(), modlink_core::CommunicationError>(())
//! ```

pub mod communication;
pub mod flags;
pub mod module;
pub mod namespace;

// Registry exports
pub use communication::{
    Communication, CommunicationContext, CommunicationError, CommunicationKind,
};
pub use namespace::{Namespace, NamespaceResolver};

// Primitive exports
pub use communication::broadcast::{Broadcaster, Subscription};
pub use communication::extension_point::{
    CapabilitySpec, ExtensionPointHandle, Implementor, MethodSpec,
};
pub use communication::stream::{Stream, StreamError, StreamSession};
pub use communication::value::{Arguments, Value, ValueType};

// Module system exports
pub use flags::FlagRegistry;
pub use module::{
    DependencyResolver, Module, ModuleDescriptor, ModuleError, ModuleManifest, ModuleRuntime,
    ModuleSource, RUNTIME_VERSION,
};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::communication::broadcast::{Broadcaster, Subscription};
    pub use crate::communication::extension_point::{
        CapabilitySpec, ExtensionPointHandle, Implementor, MethodSpec,
    };
    pub use crate::communication::stream::{Stream, StreamError, StreamSession};
    pub use crate::communication::value::{Arguments, Value, ValueType};
    pub use crate::communication::{
        CommunicationContext, CommunicationError, CommunicationKind,
    };
    pub use crate::flags::FlagRegistry;
    pub use crate::module::{
        Module, ModuleDescriptor, ModuleError, ModuleManifest, ModuleRuntime, ModuleSource,
    };
    pub use crate::namespace::{Namespace, NamespaceResolver};
}
