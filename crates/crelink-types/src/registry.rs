//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable module (storage backends, bridge providers) exposes a
/// `Registry` struct implementing this trait so the engine builder can map
/// configuration names to factory functions.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. `"memory"` for `storage.implementations.memory` or `"lock_mint"`
	/// for `bridge.implementations.lock_mint`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory function for this implementation.
	fn factory() -> Self::Factory;
}
