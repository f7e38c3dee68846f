use std::sync::Arc;

use tracing::debug;

use crate::errors::{Result, SerializationError};
use crate::registry::Registry;
use crate::schema::assembly::AssemblyName;
use crate::schema::ty::TypeHandle;

/// Maps a persisted type name onto a registered host type.
///
/// Exact matching binds the assembly identity first; in tolerant mode a miss
/// falls back to a name-only search across every registered assembly, first
/// match wins, and the result is cached process-wide. Retargetable assembly
/// identities bind by simple name to the best compatible version in either
/// mode.
pub(crate) struct TypeResolver<'l> {
	registry: &'l Registry,
	tolerant: bool,
}

impl<'l> TypeResolver<'l> {
	pub fn new(registry: &'l Registry, tolerant: bool) -> Self {
		Self { registry, tolerant }
	}

	pub fn resolve_named(&self, assembly: &AssemblyName, full_name: &str) -> Result<TypeHandle> {
		if let Some(handle) = self.exact_match(assembly, full_name) {
			return Ok(handle);
		}

		if !self.tolerant {
			return Err(self.strict_error(assembly, full_name));
		}

		if let Some(handle) = self.registry.cached_resolution(assembly, full_name) {
			return Ok(handle);
		}

		match self.registry.type_by_name(full_name) {
			Some(handle) => {
				debug!(ty = full_name, from = %assembly, "Resolved type by name-only fallback");
				self.registry.cache_resolution(assembly.clone(), Arc::from(full_name), handle);
				Ok(handle)
			},
			None => Err(SerializationError::TypeNotFound(full_name.to_string())),
		}
	}

	fn exact_match(&self, assembly: &AssemblyName, full_name: &str) -> Option<TypeHandle> {
		match assembly.is_retargetable() {
			true => self
				.registry
				.assemblies()
				.iter()
				.filter(|entry| entry.name.name == assembly.name)
				.filter(|entry| entry.name.version.is_compatible_with(&assembly.version))
				.max_by_key(|entry| entry.name.version)
				.and_then(|entry| entry.types.get(full_name).copied()),
			false => self
				.registry
				.assemblies()
				.iter()
				.find(|entry| &entry.name == assembly)
				.and_then(|entry| entry.types.get(full_name).copied()),
		}
	}

	fn strict_error(&self, assembly: &AssemblyName, full_name: &str) -> SerializationError {
		let known = self
			.registry
			.assemblies()
			.iter()
			.any(|entry| match assembly.is_retargetable() {
				true => entry.name.name == assembly.name,
				false => &entry.name == assembly,
			});
		match known {
			true => SerializationError::TypeNotFound(full_name.to_string()),
			false => SerializationError::AssemblyNotFound(assembly.to_string()),
		}
	}
}
