//! Serializer registry & binding (spec §4.5).
//!
//! Per-struct code-generated field serializers are out of scope here, so a
//! "binding" in this core is a committed `TypeMeta` schema the writer encodes
//! against and the reader falls back to for non-compatible (schema-less)
//! struct reads, not a per-host-type generated codec (see DESIGN.md).

use std::rc::Rc;

use fxhash::FxHashMap;
use nohash_hasher::IntMap;

use crate::error::{Error, Result};
use crate::meta::TypeMeta;
use crate::types::TypeId;

/// A user-registered type's committed schema (spec §4.5 "Registered type
/// entry").
#[derive(Debug, Clone)]
pub struct RegisteredType {
	pub kind: TypeId,
	pub schema: TypeMeta,
}

/// Version-counted map from user type id / (namespace, typename) to a
/// registered schema. Kept as an explicit, caller-owned value rather than a
/// process-wide singleton (spec §9 Design Notes offers both; see DESIGN.md
/// for the tradeoff). The version counter is monotonic and never decreases.
#[derive(Debug, Clone, Default)]
pub struct Registry {
	by_id: IntMap<u32, Rc<RegisteredType>>,
	by_name: FxHashMap<(String, String), Rc<RegisteredType>>,
	version: u32,
}

impl Registry {
	pub fn new() -> Self {
		Registry::default()
	}

	pub fn version(&self) -> u32 {
		self.version
	}

	pub fn register_by_id(&mut self, user_type_id: u32, kind: TypeId, schema: TypeMeta) {
		self.by_id
			.insert(user_type_id, Rc::new(RegisteredType { kind, schema }));
		self.version += 1;
	}

	pub fn register_by_name(
		&mut self,
		namespace: impl Into<String>,
		typename: impl Into<String>,
		kind: TypeId,
		schema: TypeMeta,
	) {
		self.by_name.insert(
			(namespace.into(), typename.into()),
			Rc::new(RegisteredType { kind, schema }),
		);
		self.version += 1;
	}

	pub fn resolve_by_id(&self, user_type_id: u32) -> Result<Rc<RegisteredType>> {
		self.by_id
			.get(&user_type_id)
			.cloned()
			.ok_or_else(|| Error::type_not_registered(format!("user_type_id={user_type_id}")))
	}

	pub fn resolve_by_name(&self, namespace: &str, typename: &str) -> Result<Rc<RegisteredType>> {
		self.by_name
			.get(&(namespace.to_string(), typename.to_string()))
			.cloned()
			.ok_or_else(|| Error::type_not_registered(format!("{namespace}.{typename}")))
	}
}

/// Holds a binding resolved at some registry version; re-resolves on a
/// version mismatch instead of trusting a stale cache (spec §4.5 "typed-
/// binding cache").
#[derive(Debug, Default)]
pub struct TypedBindingCache {
	cached: Option<(u32, Rc<RegisteredType>)>,
}

impl TypedBindingCache {
	pub fn new() -> Self {
		TypedBindingCache::default()
	}

	pub fn get_or_refresh(&mut self, registry: &Registry, user_type_id: u32) -> Result<Rc<RegisteredType>> {
		if let Some((version, binding)) = &self.cached {
			if *version == registry.version() {
				return Ok(binding.clone());
			}
		}
		let binding = registry.resolve_by_id(user_type_id)?;
		self.cached = Some((registry.version(), binding.clone()));
		Ok(binding)
	}
}

/// Value coercion for the any-value fast path: a null value is accepted only
/// when the field admits it (spec §4.5).
pub fn coerce_nullable(value_is_null: bool, nullable: bool) -> Result<()> {
	if value_is_null && !nullable {
		return Err(Error::invalid_data("null value for non-nullable field"));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::TypeMeta;

	#[test]
	fn cache_refreshes_on_version_bump() {
		let mut registry = Registry::new();
		registry.register_by_id(1, TypeId::Struct, TypeMeta::by_id(1, false, vec![]));
		let mut cache = TypedBindingCache::new();
		let first = cache.get_or_refresh(&registry, 1).unwrap();
		assert_eq!(first.kind, TypeId::Struct);

		registry.register_by_id(1, TypeId::CompatibleStruct, TypeMeta::by_id(1, false, vec![]));
		let second = cache.get_or_refresh(&registry, 1).unwrap();
		assert_eq!(second.kind, TypeId::CompatibleStruct);
	}

	#[test]
	fn unregistered_id_fails() {
		let registry = Registry::new();
		assert!(registry.resolve_by_id(99).is_err());
	}
}
