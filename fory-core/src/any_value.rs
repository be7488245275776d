//! The dynamic object-graph value and the any-value (dynamic) codec (spec
//! §3, §4.10).
//!
//! Per-struct code-generated field serializers are out of scope (a stated
//! non-goal), so the host value this core serializes against is this single
//! recursive `DynValue`, not a generic Rust type parameter — see DESIGN.md.

use std::cell::RefCell;
use std::rc::Rc;

use crate::array::{self, PrimitiveArray};
use crate::context::{ReadContext, WriteContext};
use crate::error::{Error, Result};
use crate::meta::type_meta::TypeMetaFieldType;
use crate::meta::TypeMeta;
use crate::primitive::{self, Duration, Timestamp};
use crate::registry::Registry;
use crate::resolver::TypeResolver;
use crate::types::{RefFlag, TypeId};

pub type Shared<T> = Rc<RefCell<T>>;

#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
	Null,
	Bool(bool),
	Int8(i8),
	Int16(i16),
	Int32(i32),
	Int64(i64),
	UInt8(u8),
	UInt16(u16),
	UInt32(u32),
	UInt64(u64),
	Float32(f32),
	Float64(f64),
	String(String),
	Binary(Vec<u8>),
	Date(i32),
	Timestamp(Timestamp),
	Duration(Duration),
	List(Shared<Vec<DynValue>>),
	Set(Shared<Vec<DynValue>>),
	Map(Shared<DynMap>),
	Struct(Shared<DynStruct>),
	/// A typed primitive array (spec §4.7 "Arrays of primitives") — distinct
	/// from `List`: fixed-width memcpy-style payload, no per-element tags.
	Array(Shared<PrimitiveArray>),
}

/// Null-key-aware map (spec §9 Design Notes "Null-key dictionary"): one
/// non-null dictionary plus a `(hasNull, nullValue)` pair, iterating
/// null-first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynMap {
	pub has_null: bool,
	pub null_value: Option<Box<DynValue>>,
	entries: Vec<(DynValue, DynValue)>,
}

impl DynMap {
	pub fn new() -> Self {
		DynMap::default()
	}

	pub fn count(&self) -> usize {
		self.entries.len() + self.has_null as usize
	}

	pub fn snapshot(&self) -> &[(DynValue, DynValue)] {
		&self.entries
	}

	pub fn set(&mut self, key: DynValue, value: DynValue) {
		if matches!(key, DynValue::Null) {
			self.has_null = true;
			self.null_value = Some(Box::new(value));
			return;
		}
		if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
			slot.1 = value;
		} else {
			self.entries.push((key, value));
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynStruct {
	pub type_meta: Rc<TypeMeta>,
	pub fields: Vec<(String, DynValue)>,
}

impl DynStruct {
	pub fn get(&self, name: &str) -> Option<&DynValue> {
		self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
	}
}

/// Pointer identity for the reference-trackable kinds (containers and
/// structs); scalars are never shared (spec §3 invariants).
pub fn shared_identity(value: &DynValue) -> Option<usize> {
	match value {
		DynValue::List(v) | DynValue::Set(v) => Some(Rc::as_ptr(v) as usize),
		DynValue::Map(v) => Some(Rc::as_ptr(v) as usize),
		DynValue::Struct(v) => Some(Rc::as_ptr(v) as usize),
		DynValue::Array(v) => Some(Rc::as_ptr(v) as usize),
		_ => None,
	}
}

pub fn wire_type_id_of(value: &DynValue) -> TypeId {
	match value {
		DynValue::Null => TypeId::None,
		DynValue::Bool(_) => TypeId::Bool,
		DynValue::Int8(_) => TypeId::Int8,
		DynValue::Int16(_) => TypeId::Int16,
		DynValue::Int32(_) => TypeId::VarInt32,
		DynValue::Int64(_) => TypeId::VarInt64,
		DynValue::UInt8(_) => TypeId::UInt8,
		DynValue::UInt16(_) => TypeId::UInt16,
		DynValue::UInt32(_) => TypeId::VarUInt32,
		DynValue::UInt64(_) => TypeId::VarUInt64,
		DynValue::Float32(_) => TypeId::Float32,
		DynValue::Float64(_) => TypeId::Float64,
		DynValue::String(_) => TypeId::String,
		DynValue::Binary(_) => TypeId::Binary,
		DynValue::Date(_) => TypeId::Date,
		DynValue::Timestamp(_) => TypeId::Timestamp,
		DynValue::Duration(_) => TypeId::Duration,
		DynValue::Map(_) => TypeId::Map,
		DynValue::List(_) => TypeId::List,
		DynValue::Set(_) => TypeId::Set,
		DynValue::Array(v) => v.borrow().type_id(),
		DynValue::Struct(s) => {
			if s.borrow().type_meta.register_by_name {
				TypeId::NamedCompatibleStruct
			} else {
				TypeId::CompatibleStruct
			}
		}
	}
}

pub(crate) fn kv_pair(generics: &[TypeMetaFieldType]) -> Option<(&TypeMetaFieldType, &TypeMetaFieldType)> {
	match (generics.first(), generics.get(1)) {
		(Some(k), Some(v)) => Some((k, v)),
		_ => None,
	}
}

/// Writes a value's raw payload for a known `type_id`, with no ref or null
/// wrapper — used by both the declared-field path and the any-value dynamic
/// path once the type is known (spec §4.2, §4.7-4.10).
pub fn write_payload(
	ctx: &mut WriteContext,
	value: &DynValue,
	type_id: TypeId,
	generics: &[TypeMetaFieldType],
) -> Result<()> {
	match (type_id, value) {
		(TypeId::Bool, DynValue::Bool(v)) => primitive::write_bool(&mut ctx.writer, *v),
		(TypeId::Int8, DynValue::Int8(v)) => ctx.writer.write_i8(*v),
		(TypeId::UInt8, DynValue::UInt8(v)) => ctx.writer.write_u8(*v),
		(TypeId::Int16, DynValue::Int16(v)) => ctx.writer.write_i16(*v),
		(TypeId::UInt16, DynValue::UInt16(v)) => ctx.writer.write_u16(*v),
		(TypeId::Int32, DynValue::Int32(v)) => ctx.writer.write_i32(*v),
		(TypeId::UInt32, DynValue::UInt32(v)) => ctx.writer.write_u32(*v),
		(TypeId::VarInt32, DynValue::Int32(v)) => ctx.writer.write_var_int32(*v),
		(TypeId::VarUInt32, DynValue::UInt32(v)) => ctx.writer.write_var_uint32(*v),
		(TypeId::Int64, DynValue::Int64(v)) => ctx.writer.write_i64(*v),
		(TypeId::UInt64, DynValue::UInt64(v)) => ctx.writer.write_u64(*v),
		(TypeId::VarInt64, DynValue::Int64(v)) => ctx.writer.write_var_int64(*v),
		(TypeId::VarUInt64, DynValue::UInt64(v)) => ctx.writer.write_var_uint64(*v),
		(TypeId::TaggedInt64, DynValue::Int64(v)) => ctx.writer.write_tagged_int64(*v),
		(TypeId::TaggedUInt64, DynValue::UInt64(v)) => ctx.writer.write_tagged_uint64(*v),
		(TypeId::Float32, DynValue::Float32(v)) => ctx.writer.write_f32(*v),
		(TypeId::Float64, DynValue::Float64(v)) => ctx.writer.write_f64(*v),
		(TypeId::String, DynValue::String(v)) => primitive::write_string(&mut ctx.writer, v)?,
		(TypeId::Binary, DynValue::Binary(v)) => primitive::write_binary(&mut ctx.writer, v),
		(TypeId::Date, DynValue::Date(v)) => primitive::write_date(&mut ctx.writer, *v),
		(TypeId::Timestamp, DynValue::Timestamp(v)) => primitive::write_timestamp(&mut ctx.writer, *v),
		(TypeId::Duration, DynValue::Duration(v)) => primitive::write_duration(&mut ctx.writer, *v),
		(TypeId::List, DynValue::List(v)) => {
			crate::collection::write_collection(ctx, &v.borrow(), generics.first(), false)?
		}
		(TypeId::Set, DynValue::Set(v)) => {
			crate::collection::write_collection(ctx, &v.borrow(), generics.first(), true)?
		}
		(TypeId::Map, DynValue::Map(v)) => crate::map::write_map(ctx, &v.borrow(), kv_pair(generics))?,
		(
			TypeId::BoolArray
			| TypeId::Int8Array
			| TypeId::Int16Array
			| TypeId::Int32Array
			| TypeId::Int64Array
			| TypeId::UInt8Array
			| TypeId::UInt16Array
			| TypeId::UInt32Array
			| TypeId::UInt64Array
			| TypeId::Float32Array
			| TypeId::Float64Array,
			DynValue::Array(v),
		) => array::write_array(&mut ctx.writer, &v.borrow()),
		(TypeId::Struct | TypeId::CompatibleStruct | TypeId::NamedCompatibleStruct, DynValue::Struct(v)) => {
			crate::serializer::write_struct(ctx, &v.borrow())?
		}
		(TypeId::None, DynValue::Null) => {}
		_ => return Err(Error::invalid_data("value does not match its declared TypeId")),
	}
	Ok(())
}

/// Mirrors `write_payload` on the read side for an already-known `type_id`.
/// `reserved_id` is `Some` when this payload is the RefValue body of an
/// already-reserved slot: containers finish that slot immediately (sharing
/// the placeholder cell before recursing into children) so a cyclic
/// self-reference resolves to the same underlying cell (spec §4.4, §4.10).
pub fn read_payload(
	ctx: &mut ReadContext<DynValue>,
	type_id: TypeId,
	generics: &[TypeMetaFieldType],
	reserved_id: Option<u32>,
) -> Result<DynValue> {
	match type_id {
		TypeId::List => {
			let shared = Rc::new(RefCell::new(Vec::new()));
			if reserved_id.is_some() {
				ctx.ref_reader
					.finish_pending_reference_if_needed(DynValue::List(shared.clone()))?;
			}
			crate::collection::read_collection_into(ctx, &shared, generics.first())?;
			return Ok(DynValue::List(shared));
		}
		TypeId::Set => {
			let shared = Rc::new(RefCell::new(Vec::new()));
			if reserved_id.is_some() {
				ctx.ref_reader
					.finish_pending_reference_if_needed(DynValue::Set(shared.clone()))?;
			}
			crate::collection::read_collection_into(ctx, &shared, generics.first())?;
			return Ok(DynValue::Set(shared));
		}
		TypeId::Map => {
			let shared = Rc::new(RefCell::new(DynMap::new()));
			if reserved_id.is_some() {
				ctx.ref_reader
					.finish_pending_reference_if_needed(DynValue::Map(shared.clone()))?;
			}
			crate::map::read_map_into(ctx, &shared, kv_pair(generics))?;
			return Ok(DynValue::Map(shared));
		}
		TypeId::Struct | TypeId::CompatibleStruct | TypeId::NamedCompatibleStruct => {
			let placeholder = Rc::new(RefCell::new(DynStruct {
				type_meta: Rc::new(TypeMeta::by_id(0, false, vec![])),
				fields: Vec::new(),
			}));
			if reserved_id.is_some() {
				ctx.ref_reader
					.finish_pending_reference_if_needed(DynValue::Struct(placeholder.clone()))?;
			}
			let built = crate::serializer::read_struct(ctx)?;
			*placeholder.borrow_mut() = built;
			return Ok(DynValue::Struct(placeholder));
		}
		_ => {}
	}

	let value = match type_id {
		TypeId::Bool => DynValue::Bool(primitive::read_bool(&mut ctx.reader)?),
		TypeId::Int8 => DynValue::Int8(ctx.reader.read_i8()?),
		TypeId::UInt8 => DynValue::UInt8(ctx.reader.read_u8()?),
		TypeId::Int16 => DynValue::Int16(ctx.reader.read_i16()?),
		TypeId::UInt16 => DynValue::UInt16(ctx.reader.read_u16()?),
		TypeId::Int32 => DynValue::Int32(ctx.reader.read_i32()?),
		TypeId::UInt32 => DynValue::UInt32(ctx.reader.read_u32()?),
		TypeId::VarInt32 => DynValue::Int32(ctx.reader.read_var_int32()?),
		TypeId::VarUInt32 => DynValue::UInt32(ctx.reader.read_var_uint32()?),
		TypeId::Int64 => DynValue::Int64(ctx.reader.read_i64()?),
		TypeId::UInt64 => DynValue::UInt64(ctx.reader.read_u64()?),
		TypeId::VarInt64 => DynValue::Int64(ctx.reader.read_var_int64()?),
		TypeId::VarUInt64 => DynValue::UInt64(ctx.reader.read_var_uint64()?),
		TypeId::TaggedInt64 => DynValue::Int64(ctx.reader.read_tagged_int64()?),
		TypeId::TaggedUInt64 => DynValue::UInt64(ctx.reader.read_tagged_uint64()?),
		TypeId::Float32 => DynValue::Float32(ctx.reader.read_f32()?),
		TypeId::Float64 => DynValue::Float64(ctx.reader.read_f64()?),
		TypeId::String => DynValue::String(primitive::read_string(&mut ctx.reader)?),
		TypeId::Binary => DynValue::Binary(primitive::read_binary(&mut ctx.reader)?),
		TypeId::Date => DynValue::Date(primitive::read_date(&mut ctx.reader)?),
		TypeId::Timestamp => DynValue::Timestamp(primitive::read_timestamp(&mut ctx.reader)?),
		TypeId::Duration => DynValue::Duration(primitive::read_duration(&mut ctx.reader)?),
		TypeId::BoolArray
		| TypeId::Int8Array
		| TypeId::Int16Array
		| TypeId::Int32Array
		| TypeId::Int64Array
		| TypeId::UInt8Array
		| TypeId::UInt16Array
		| TypeId::UInt32Array
		| TypeId::UInt64Array
		| TypeId::Float32Array
		| TypeId::Float64Array => {
			DynValue::Array(Rc::new(RefCell::new(array::read_array(&mut ctx.reader, type_id)?)))
		}
		TypeId::Float8Array | TypeId::Float16Array | TypeId::BFloat16Array => {
			return Err(Error::invalid_data(format!(
				"{type_id:?} is a reserved array TypeId with no codec"
			)))
		}
		TypeId::None => DynValue::Null,
		other => return Err(Error::invalid_data(format!("unsupported dynamic TypeId {other:?}"))),
	};
	if reserved_id.is_some() {
		ctx.ref_reader.finish_pending_reference_if_needed(value.clone())?;
	}
	Ok(value)
}

/// Writes the ref tag (when `ctx.track_ref`), then the dynamic `TypeId` tag
/// as a `varuint32`, then the payload. Used for fields declared `Unknown` and
/// for a map's dynamic key/value slow path (spec §4.8, §4.10) — collection
/// elements use the narrower bare tag-plus-payload form in
/// `collection::write_collection`.
pub fn write_any(ctx: &mut WriteContext, value: &DynValue) -> Result<()> {
	if ctx.track_ref {
		match shared_identity(value) {
			Some(identity) => match ctx.ref_writer.try_write_reference(identity) {
				Some(existing_id) => {
					ctx.writer.write_i8(RefFlag::Ref as i8);
					ctx.writer.write_var_uint32(existing_id);
					return Ok(());
				}
				None => ctx.writer.write_i8(RefFlag::RefValue as i8),
			},
			None if matches!(value, DynValue::Null) => {
				ctx.writer.write_i8(RefFlag::Null as i8);
				return Ok(());
			}
			None => ctx.writer.write_i8(RefFlag::NotNullValue as i8),
		}
	}

	let type_id = wire_type_id_of(value);
	ctx.writer.write_var_uint32(type_id.as_u8() as u32);
	write_payload(ctx, value, type_id, &[])
}

/// Reads the ref tag (when `ctx.track_ref`), then dispatches on the dynamic
/// type prefix: `registry`/`resolver` resolve id/name-registered schemas and
/// decode the inline `TypeMeta` a compatible struct carries (spec §4.6).
pub fn read_any(ctx: &mut ReadContext<DynValue>, registry: &Registry, resolver: &TypeResolver) -> Result<DynValue> {
	let reserved_id = if ctx.track_ref {
		let flag = RefFlag::from_repr(ctx.reader.read_i8()?)
			.ok_or_else(|| Error::ref_error("invalid RefFlag byte in any-value"))?;
		match flag {
			RefFlag::Null => return Ok(DynValue::Null),
			RefFlag::Ref => {
				let id = ctx.reader.read_var_uint32()?;
				return ctx
					.ref_reader
					.read_ref_value(id)?
					.ok_or_else(|| Error::ref_error("back-reference to an unfinished value"));
			}
			RefFlag::RefValue => Some(ctx.ref_reader.reserve_ref_id()),
			RefFlag::NotNullValue => None,
		}
	} else {
		None
	};

	let info = crate::resolver::read_dynamic_type_info(&mut ctx.reader, resolver)?;
	crate::resolver::read_dynamic_value(ctx, registry, &info, reserved_id)
}

/// Reads a struct whose schema (`type_meta`) is already known — resolved
/// from a registry or decoded as part of a dynamic type prefix — rather than
/// self-describing on the wire. Shares the placeholder/backfill cyclic-ref
/// pattern with `read_payload`'s struct arm (spec §4.4, §4.6).
pub fn read_struct_value(
	ctx: &mut ReadContext<DynValue>,
	type_meta: TypeMeta,
	reserved_id: Option<u32>,
) -> Result<DynValue> {
	let placeholder = Rc::new(RefCell::new(DynStruct {
		type_meta: Rc::new(type_meta.clone()),
		fields: Vec::new(),
	}));
	if reserved_id.is_some() {
		ctx.ref_reader
			.finish_pending_reference_if_needed(DynValue::Struct(placeholder.clone()))?;
	}
	let built = crate::serializer::read_struct_with_meta(ctx, type_meta)?;
	*placeholder.borrow_mut() = built;
	Ok(DynValue::Struct(placeholder))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::buffer::Reader;

	#[test]
	fn heterogeneous_values_round_trip_through_any_codec() {
		let mut wctx = WriteContext::new(false, false, 64);
		write_any(&mut wctx, &DynValue::Int32(1)).unwrap();
		write_any(&mut wctx, &DynValue::String("x".into())).unwrap();
		let bytes = wctx.writer.to_vec();
		assert_eq!(bytes, vec![0x05, 0x02, 0x15, 0x06, 0x78]);

		let registry = Registry::default();
		let resolver = TypeResolver::default();
		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 64);
		assert_eq!(read_any(&mut rctx, &registry, &resolver).unwrap(), DynValue::Int32(1));
		assert_eq!(
			read_any(&mut rctx, &registry, &resolver).unwrap(),
			DynValue::String("x".into())
		);
	}

	#[test]
	fn tracked_any_value_round_trips_a_shared_reference() {
		let shared = Rc::new(RefCell::new(vec![DynValue::Int32(1)]));
		let list = DynValue::List(shared);

		let mut wctx = WriteContext::new(true, false, 64);
		write_any(&mut wctx, &list).unwrap();
		write_any(&mut wctx, &list).unwrap();
		let bytes = wctx.writer.to_vec();

		let registry = Registry::default();
		let resolver = TypeResolver::default();
		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), true, false, 64);
		let first = read_any(&mut rctx, &registry, &resolver).unwrap();
		let second = read_any(&mut rctx, &registry, &resolver).unwrap();
		assert_eq!(shared_identity(&first), shared_identity(&second));
	}

	#[test]
	fn any_struct_value_round_trips_through_its_inline_compatible_type_meta() {
		use crate::meta::type_meta::TypeMetaFieldInfo;

		let schema = vec![TypeMetaFieldInfo::named(
			"a",
			TypeMetaFieldType::scalar(TypeId::VarInt32, false, false),
		)];
		let value = DynValue::Struct(Rc::new(RefCell::new(DynStruct {
			type_meta: Rc::new(TypeMeta::by_id(1, true, schema)),
			fields: vec![("a".to_string(), DynValue::Int32(9))],
		})));

		let mut wctx = WriteContext::new(false, false, 64);
		write_any(&mut wctx, &value).unwrap();
		let bytes = wctx.writer.to_vec();

		let registry = Registry::default();
		let resolver = TypeResolver::default();
		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 64);
		assert_eq!(read_any(&mut rctx, &registry, &resolver).unwrap(), value);
	}
}
