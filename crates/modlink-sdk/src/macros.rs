//! Declarative sugar for module authors.

/// Bind a module type to the entry reference its descriptors use.
///
/// This is registration sugar only: it wires the type into
/// [`StaticModuleSource::with_module`](crate::StaticModuleSource::with_module),
/// nothing more. The module still registers its communications explicitly in
/// its load hook.
///
/// # Example
///
/// ```
/// use modlink_sdk::prelude::*;
///
/// #[derive(Default)]
/// struct ClockModule;
///
/// impl Module for ClockModule {
///     fn namespace_id(&self) -> &str {
///         "clock"
///     }
///
///     fn on_loaded(&self, context: &CommunicationContext) -> ModuleResult<()> {
///         context.create_function("now", |_| Ok(Some(Value::Integer(0))))?;
///         Ok(())
///     }
///
///     fn on_unloaded(&self, _context: &CommunicationContext) {}
/// }
///
/// declare_module!(ClockModule, entry: "clock::ClockModule");
///
/// let source = StaticModuleSource::new().with_module::<ClockModule>();
/// assert_eq!(ClockModule::ENTRY, "clock::ClockModule");
/// ```
#[macro_export]
macro_rules! declare_module {
    ($module:ty, entry: $entry:expr) => {
        impl $crate::StaticModule for $module {
            const ENTRY: &'static str = $entry;
        }
    };
}
