//! modlink module SDK.
//!
//! Everything a module author needs in one place: the [`Module`] contract,
//! the communication context API, and compiled-in registration so statically
//! linked modules load through the same descriptors as dynamically delivered
//! ones.
//!
//! # Quick start
//!
//! ```
//! use modlink_sdk::prelude::*;
//!
//! #[derive(Default)]
//! struct EchoModule;
//!
//! impl Module for EchoModule {
//!     fn namespace_id(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn on_loaded(&self, context: &CommunicationContext) -> ModuleResult<()> {
//!         context.create_function("echo", |args| {
//!             Ok(Some(Value::from(args.get_str("text")?)))
//!         })?;
//!         Ok(())
//!     }
//!
//!     fn on_unloaded(&self, _context: &CommunicationContext) {}
//! }
//!
//! declare_module!(EchoModule, entry: "echo::EchoModule");
//! ```

pub mod source;

#[macro_use]
mod macros;

pub use source::{StaticModule, StaticModuleSource};

/// Re-exports commonly used types for module authors.
pub mod prelude {
    pub use crate::declare_module;
    pub use crate::source::{StaticModule, StaticModuleSource};
    pub use modlink_core::prelude::*;
    pub use modlink_core::{args, module::Result as ModuleResult};
}
