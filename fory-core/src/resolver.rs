//! Type resolver: registration-mode tracking and dynamic prefix decoding
//! (spec §4.6).

use fxhash::FxHashMap;

use crate::any_value::{self, DynValue};
use crate::buffer::Reader;
use crate::context::ReadContext;
use crate::error::{Error, Result};
use crate::meta::TypeMeta;
use crate::primitive;
use crate::registry::Registry;
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationMode {
	IdOnly,
	NameOnly,
	Mixed,
}

/// Per-kind record of whether registrations have been id-only, name-only, or
/// mixed (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct TypeResolver {
	modes: FxHashMap<TypeId, RegistrationMode>,
}

impl TypeResolver {
	pub fn new() -> Self {
		TypeResolver::default()
	}

	pub fn record_id_registration(&mut self, kind: TypeId) {
		self.update_mode(kind, RegistrationMode::IdOnly);
	}

	pub fn record_name_registration(&mut self, kind: TypeId) {
		self.update_mode(kind, RegistrationMode::NameOnly);
	}

	fn update_mode(&mut self, kind: TypeId, observed: RegistrationMode) {
		let mode = self.modes.entry(kind).or_insert(observed);
		if *mode != observed {
			*mode = RegistrationMode::Mixed;
		}
	}

	pub fn mode_for(&self, kind: TypeId) -> Option<RegistrationMode> {
		self.modes.get(&kind).copied()
	}
}

/// An in-flight descriptor produced by the read side when it sees a dynamic
/// type prefix (spec §3 "DynamicTypeInfo").
#[derive(Debug, Clone)]
pub struct DynamicTypeInfo {
	pub wire_type_id: TypeId,
	pub user_type_id: Option<u32>,
	pub namespace: Option<String>,
	pub typename: Option<String>,
	pub compatible_type_meta: Option<TypeMeta>,
}

/// Reads a `varuint32` wire kind and branches per spec §4.6.
pub fn read_dynamic_type_info(reader: &mut Reader, resolver: &TypeResolver) -> Result<DynamicTypeInfo> {
	let wire_kind_raw = reader.read_var_uint32()?;
	let wire_type_id = TypeId::from_repr(wire_kind_raw as u8)
		.ok_or_else(|| Error::invalid_data("unknown wire TypeId in dynamic prefix"))?;

	match wire_type_id {
		TypeId::CompatibleStruct | TypeId::NamedCompatibleStruct => {
			let meta = TypeMeta::decode(reader)?;
			Ok(DynamicTypeInfo {
				wire_type_id,
				user_type_id: meta.user_type_id,
				namespace: meta.namespace.clone(),
				typename: meta.typename.clone(),
				compatible_type_meta: Some(meta),
			})
		}
		TypeId::NamedStruct | TypeId::NamedEnum | TypeId::NamedExt | TypeId::NamedUnion => {
			let namespace = primitive::read_string(reader)?;
			let typename = primitive::read_string(reader)?;
			Ok(DynamicTypeInfo {
				wire_type_id,
				user_type_id: None,
				namespace: Some(namespace),
				typename: Some(typename),
				compatible_type_meta: None,
			})
		}
		TypeId::Struct | TypeId::Enum | TypeId::Ext | TypeId::TypedUnion => match resolver.mode_for(wire_type_id) {
			Some(RegistrationMode::NameOnly) => {
				let namespace = primitive::read_string(reader)?;
				let typename = primitive::read_string(reader)?;
				Ok(DynamicTypeInfo {
					wire_type_id,
					user_type_id: None,
					namespace: Some(namespace),
					typename: Some(typename),
					compatible_type_meta: None,
				})
			}
			Some(RegistrationMode::Mixed) => {
				Err(Error::invalid_data("ambiguous dynamic type registration mode"))
			}
			_ => {
				let id = reader.read_var_uint32()?;
				Ok(DynamicTypeInfo {
					wire_type_id,
					user_type_id: Some(id),
					namespace: None,
					typename: None,
					compatible_type_meta: None,
				})
			}
		},
		_ => Ok(DynamicTypeInfo {
			wire_type_id,
			user_type_id: None,
			namespace: None,
			typename: None,
			compatible_type_meta: None,
		}),
	}
}

/// Dispatches on a decoded `DynamicTypeInfo`: a compatible struct uses the
/// `TypeMeta` it carried inline, a non-compatible struct resolves its schema
/// from the `Registry` by id or by (namespace, typename), everything else
/// goes straight to the fixed-shape payload codec (spec §4.6).
pub fn read_dynamic_value(
	ctx: &mut ReadContext<DynValue>,
	registry: &Registry,
	info: &DynamicTypeInfo,
	reserved_id: Option<u32>,
) -> Result<DynValue> {
	match info.wire_type_id {
		TypeId::CompatibleStruct | TypeId::NamedCompatibleStruct => {
			let type_meta = info
				.compatible_type_meta
				.clone()
				.ok_or_else(|| Error::invalid_data("compatible struct prefix missing its TypeMeta"))?;
			any_value::read_struct_value(ctx, type_meta, reserved_id)
		}
		TypeId::Struct | TypeId::NamedStruct => {
			let registered = match info.user_type_id {
				Some(id) => registry.resolve_by_id(id)?,
				None => {
					let namespace = info
						.namespace
						.as_deref()
						.ok_or_else(|| Error::invalid_data("struct prefix missing namespace"))?;
					let typename = info
						.typename
						.as_deref()
						.ok_or_else(|| Error::invalid_data("struct prefix missing typename"))?;
					registry.resolve_by_name(namespace, typename)?
				}
			};
			any_value::read_struct_value(ctx, registered.schema.clone(), reserved_id)
		}
		_ => any_value::read_payload(ctx, info.wire_type_id, &[], reserved_id),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::buffer::Writer;

	#[test]
	fn mixed_registration_is_reported_as_ambiguous() {
		let mut resolver = TypeResolver::new();
		resolver.record_id_registration(TypeId::Struct);
		resolver.record_name_registration(TypeId::Struct);
		assert_eq!(resolver.mode_for(TypeId::Struct), Some(RegistrationMode::Mixed));

		let mut w = Writer::new();
		w.write_var_uint32(TypeId::Struct as u32);
		let bytes = w.to_vec();
		let mut r = Reader::new(&bytes);
		let err = read_dynamic_type_info(&mut r, &resolver).unwrap_err();
		assert!(matches!(err, Error::InvalidData(msg) if msg.contains("ambiguous")));
	}

	#[test]
	fn id_only_struct_reads_varuint_id() {
		let mut resolver = TypeResolver::new();
		resolver.record_id_registration(TypeId::Struct);

		let mut w = Writer::new();
		w.write_var_uint32(TypeId::Struct as u32);
		w.write_var_uint32(42);
		let bytes = w.to_vec();
		let mut r = Reader::new(&bytes);
		let info = read_dynamic_type_info(&mut r, &resolver).unwrap();
		assert_eq!(info.user_type_id, Some(42));
	}

	#[test]
	fn primitive_kind_has_no_user_type_info() {
		let resolver = TypeResolver::new();
		let mut w = Writer::new();
		w.write_var_uint32(TypeId::VarInt32 as u32);
		let bytes = w.to_vec();
		let mut r = Reader::new(&bytes);
		let info = read_dynamic_type_info(&mut r, &resolver).unwrap();
		assert_eq!(info.wire_type_id, TypeId::VarInt32);
		assert_eq!(info.user_type_id, None);
	}

	#[test]
	fn registered_struct_value_resolves_its_schema_from_the_registry() {
		use crate::context::WriteContext;
		use crate::meta::type_meta::{TypeMetaFieldInfo, TypeMetaFieldType};
		use crate::serializer::write_declared;

		let schema = vec![TypeMetaFieldInfo::named(
			"id",
			TypeMetaFieldType::scalar(TypeId::VarInt32, false, false),
		)];
		let mut registry = Registry::new();
		registry.register_by_id(7, TypeId::Struct, TypeMeta::by_id(7, true, schema.clone()));
		let mut resolver = TypeResolver::new();
		resolver.record_id_registration(TypeId::Struct);

		let mut w = Writer::new();
		w.write_var_uint32(TypeId::Struct as u32);
		w.write_var_uint32(7);
		let mut wctx = WriteContext::new(false, false, 32);
		write_declared(&mut wctx, &DynValue::Int32(42), &schema[0].field_type).unwrap();
		w.write_bytes(&wctx.writer.to_vec());
		let bytes = w.to_vec();

		let mut r = Reader::new(&bytes);
		let info = read_dynamic_type_info(&mut r, &resolver).unwrap();
		let mut rctx: ReadContext<DynValue> = ReadContext::new(r, false, false, 32);
		let value = read_dynamic_value(&mut rctx, &registry, &info, None).unwrap();
		match value {
			DynValue::Struct(s) => assert_eq!(s.borrow().get("id"), Some(&DynValue::Int32(42))),
			other => panic!("expected a struct, got {other:?}"),
		}
	}
}
