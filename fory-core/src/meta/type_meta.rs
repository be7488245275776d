//! `TypeMeta` schema codec (spec §3, §4.3).

use crate::buffer::{Reader, Writer};
use crate::error::{Error, Result};
use crate::hash::type_meta_body_hash;
use crate::meta::meta_string;
use crate::types::{MetaStringEncoding, TypeId};

const HEADER_SIZE_MASK: u64 = 0xFF;
const HEADER_COMPRESSED_BIT: u64 = 1 << 8;
const HEADER_HAS_FIELDS_META_BIT: u64 = 1 << 9;
const HEADER_HASH_SHIFT: u32 = 14;
const HEADER_SIZE_EXT_SENTINEL: usize = 0xFF;

const BODY_NUM_FIELDS_MASK: u8 = 0x1F;
const BODY_REGISTER_BY_NAME_BIT: u8 = 0x20;
const BODY_NUM_FIELDS_EXT_SENTINEL: usize = 0x1F;

/// A declared field type: a `(TypeId, nullable, trackRef)` triple plus generic
/// arguments (one for list/set, two for map) (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMetaFieldType {
	pub type_id: TypeId,
	pub nullable: bool,
	pub track_ref: bool,
	pub generics: Vec<TypeMetaFieldType>,
}

impl TypeMetaFieldType {
	pub fn scalar(type_id: TypeId, nullable: bool, track_ref: bool) -> Self {
		TypeMetaFieldType {
			type_id,
			nullable,
			track_ref,
			generics: Vec::new(),
		}
	}

	fn expected_generics(type_id: TypeId) -> usize {
		match type_id {
			TypeId::List | TypeId::Set => 1,
			TypeId::Map => 2,
			_ => 0,
		}
	}

	/// Root form: a 30-bit varint packing the type id with two low flag bits.
	/// Generic children follow as header-less 8-bit type ids.
	pub fn encode_root(&self, writer: &mut Writer) {
		let header = ((self.type_id.as_u8() as u32) << 2)
			| (self.nullable as u32)
			| ((self.track_ref as u32) << 1);
		writer.write_var_uint32(header);
		for child in &self.generics {
			writer.write_u8(child.type_id.as_u8());
		}
	}

	pub fn decode_root(reader: &mut Reader) -> Result<Self> {
		let header = reader.read_var_uint32()?;
		let type_id = TypeId::from_repr((header >> 2) as u8)
			.ok_or_else(|| Error::invalid_data("unknown TypeId in TypeMetaFieldType"))?;
		let nullable = header & 1 != 0;
		let track_ref = (header >> 1) & 1 != 0;
		let mut generics = Vec::with_capacity(Self::expected_generics(type_id));
		for _ in 0..Self::expected_generics(type_id) {
			let child_id = reader.read_u8()?;
			let child_type_id = TypeId::from_repr(child_id)
				.ok_or_else(|| Error::invalid_data("unknown TypeId in generic argument"))?;
			generics.push(TypeMetaFieldType::scalar(child_type_id, false, false));
		}
		Ok(TypeMetaFieldType {
			type_id,
			nullable,
			track_ref,
			generics,
		})
	}
}

/// How a `TypeMetaFieldInfo` is addressed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldId {
	Name(String),
	/// Reserved encoding code 3: the field has no name on the wire and is
	/// addressed by a numeric tag; the reader synthesizes `$tag{id}`.
	Tag(u32),
}

impl FieldId {
	/// The name a compatible reader resolves this field under.
	pub fn resolved_name(&self) -> String {
		match self {
			FieldId::Name(name) => name.clone(),
			FieldId::Tag(id) => format!("$tag{id}"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMetaFieldInfo {
	pub id: FieldId,
	pub field_type: TypeMetaFieldType,
}

impl TypeMetaFieldInfo {
	pub fn named(name: impl Into<String>, field_type: TypeMetaFieldType) -> Self {
		TypeMetaFieldInfo {
			id: FieldId::Name(name.into()),
			field_type,
		}
	}

	pub fn tagged(tag: u32, field_type: TypeMetaFieldType) -> Self {
		TypeMetaFieldInfo {
			id: FieldId::Tag(tag),
			field_type,
		}
	}

	fn encode(&self, writer: &mut Writer) {
		let nullable = self.field_type.nullable as u8;
		let track_ref = (self.field_type.track_ref as u8) << 1;
		match &self.id {
			FieldId::Tag(tag) => {
				let header = nullable | track_ref | ((MetaStringEncoding::Tagged as u8) << 6);
				writer.write_u8(header);
				writer.write_var_uint32(*tag);
			}
			FieldId::Name(name) => {
				let encoding = meta_string::choose_encoding(name);
				let bytes = meta_string::encode(name, encoding);
				let size_minus_1 = bytes.len().saturating_sub(1);
				let size_nibble = size_minus_1.min(0xF) as u8;
				let header = nullable | track_ref | (size_nibble << 2) | ((encoding as u8) << 6);
				writer.write_u8(header);
				if size_minus_1 >= 0xF {
					writer.write_var_uint32(bytes.len() as u32);
				}
				writer.write_bytes(&bytes);
			}
		}
		self.field_type.encode_root(writer);
	}

	fn decode(reader: &mut Reader) -> Result<Self> {
		let header = reader.read_u8()?;
		let encoding_code = header >> 6;
		let size_nibble = (header >> 2) & 0x0F;
		let encoding = MetaStringEncoding::from_repr(encoding_code)
			.ok_or_else(|| Error::invalid_data("unknown MetaString encoding code"))?;

		let id = if matches!(encoding, MetaStringEncoding::Tagged) {
			FieldId::Tag(reader.read_var_uint32()?)
		} else {
			let size = if size_nibble == 0xF {
				reader.read_var_uint32()? as usize
			} else {
				size_nibble as usize + 1
			};
			let bytes = reader.read_bytes(size)?;
			FieldId::Name(meta_string::decode(&bytes, encoding)?)
		};

		let field_type = TypeMetaFieldType::decode_root(reader)?;
		Ok(TypeMetaFieldInfo { id, field_type })
	}
}

/// Per-struct schema carried on the wire for compatible-struct and dynamic
/// user-kind reads (spec §3, §4.3).
#[derive(Debug, Clone, Eq)]
pub struct TypeMeta {
	pub register_by_name: bool,
	pub user_type_id: Option<u32>,
	pub namespace: Option<String>,
	pub typename: Option<String>,
	pub has_fields_meta: bool,
	pub fields: Vec<TypeMetaFieldInfo>,
	pub body_hash: i64,
}

/// `body_hash` is excluded: it is recomputed from the encoded body on every
/// `encode()`, so a hand-built `TypeMeta` (`body_hash = 0`) and its own
/// encode-then-decode round trip describe the same schema but would
/// otherwise compare unequal (spec §8).
impl PartialEq for TypeMeta {
	fn eq(&self, other: &Self) -> bool {
		self.register_by_name == other.register_by_name
			&& self.user_type_id == other.user_type_id
			&& self.namespace == other.namespace
			&& self.typename == other.typename
			&& self.has_fields_meta == other.has_fields_meta
			&& self.fields == other.fields
	}
}

impl TypeMeta {
	pub fn by_id(user_type_id: u32, has_fields_meta: bool, fields: Vec<TypeMetaFieldInfo>) -> Self {
		TypeMeta {
			register_by_name: false,
			user_type_id: Some(user_type_id),
			namespace: None,
			typename: None,
			has_fields_meta,
			fields,
			body_hash: 0,
		}
	}

	pub fn by_name(
		namespace: impl Into<String>,
		typename: impl Into<String>,
		has_fields_meta: bool,
		fields: Vec<TypeMetaFieldInfo>,
	) -> Self {
		TypeMeta {
			register_by_name: true,
			user_type_id: None,
			namespace: Some(namespace.into()),
			typename: Some(typename.into()),
			has_fields_meta,
			fields,
			body_hash: 0,
		}
	}

	/// Encodes to `header(u64) [ size-ext(varuint) ] body` (spec §3, §4.3).
	/// `compressed=true` meta is out of scope and rejected with `EncodingError`.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
	pub fn encode(&self, writer: &mut Writer) -> Result<()> {
		let mut body_writer = Writer::new();
		self.encode_body(&mut body_writer)?;
		let body = body_writer.into_vec();

		let abs_hash50 = type_meta_body_hash(&body) as u64;
		let size_field = body.len().min(HEADER_SIZE_EXT_SENTINEL) as u64;
		let header = (abs_hash50 << HEADER_HASH_SHIFT)
			| ((self.has_fields_meta as u64) << 9)
			| size_field;
		debug_assert_eq!(header & HEADER_COMPRESSED_BIT, 0);

		writer.write_u64(header);
		if body.len() >= HEADER_SIZE_EXT_SENTINEL {
			writer.write_var_uint32((body.len() - HEADER_SIZE_EXT_SENTINEL) as u32);
		}
		writer.write_bytes(&body);
		Ok(())
	}

	fn encode_body(&self, writer: &mut Writer) -> Result<()> {
		let num_fields = self.fields.len();
		let num_fields_nibble = num_fields.min(BODY_NUM_FIELDS_EXT_SENTINEL) as u8;
		let register_by_name_bit = if self.register_by_name {
			BODY_REGISTER_BY_NAME_BIT
		} else {
			0
		};
		writer.write_u8(num_fields_nibble | register_by_name_bit);
		if num_fields >= BODY_NUM_FIELDS_EXT_SENTINEL {
			writer.write_var_uint32(num_fields as u32);
		}

		if self.register_by_name {
			let namespace = self
				.namespace
				.as_deref()
				.ok_or_else(|| Error::invalid_data("name-registered TypeMeta missing namespace"))?;
			let typename = self
				.typename
				.as_deref()
				.ok_or_else(|| Error::invalid_data("name-registered TypeMeta missing typename"))?;
			crate::primitive::write_string(writer, namespace)?;
			crate::primitive::write_string(writer, typename)?;
		} else {
			let user_type_id = self
				.user_type_id
				.ok_or_else(|| Error::invalid_data("id-registered TypeMeta missing userTypeId"))?;
			writer.write_var_uint32(user_type_id);
		}

		for field in &self.fields {
			field.encode(writer);
		}
		Ok(())
	}

	#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
	pub fn decode(reader: &mut Reader) -> Result<Self> {
		let header = reader.read_u64()?;
		if header & HEADER_COMPRESSED_BIT != 0 {
			return Err(Error::encoding_error("compressed TypeMeta is not supported"));
		}
		let has_fields_meta = header & HEADER_HAS_FIELDS_META_BIT != 0;
		let size_field = (header & HEADER_SIZE_MASK) as usize;
		let body_hash = (header >> HEADER_HASH_SHIFT) as i64;

		let body_len = if size_field >= HEADER_SIZE_EXT_SENTINEL {
			HEADER_SIZE_EXT_SENTINEL + reader.read_var_uint32()? as usize
		} else {
			size_field
		};
		let body = reader.read_bytes(body_len)?;
		let mut body_reader = Reader::new(&body);

		let body_header = body_reader.read_u8()?;
		let register_by_name = body_header & BODY_REGISTER_BY_NAME_BIT != 0;
		let num_fields_nibble = body_header & BODY_NUM_FIELDS_MASK;
		let num_fields = if num_fields_nibble as usize == BODY_NUM_FIELDS_EXT_SENTINEL {
			body_reader.read_var_uint32()? as usize
		} else {
			num_fields_nibble as usize
		};

		let (user_type_id, namespace, typename) = if register_by_name {
			let namespace = crate::primitive::read_string(&mut body_reader)?;
			let typename = crate::primitive::read_string(&mut body_reader)?;
			(None, Some(namespace), Some(typename))
		} else {
			(Some(body_reader.read_var_uint32()?), None, None)
		};

		let mut fields = Vec::with_capacity(num_fields);
		for _ in 0..num_fields {
			fields.push(TypeMetaFieldInfo::decode(&mut body_reader)?);
		}

		Ok(TypeMeta {
			register_by_name,
			user_type_id,
			namespace,
			typename,
			has_fields_meta,
			fields,
			body_hash,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_id_registered_struct() {
		let meta = TypeMeta::by_id(
			100,
			true,
			vec![
				TypeMetaFieldInfo::named(
					"a",
					TypeMetaFieldType::scalar(TypeId::VarInt32, false, false),
				),
				TypeMetaFieldInfo::named(
					"b",
					TypeMetaFieldType::scalar(TypeId::String, false, false),
				),
			],
		);
		let mut writer = Writer::new();
		meta.encode(&mut writer).unwrap();
		let bytes = writer.into_vec();
		let mut reader = Reader::new(&bytes);
		let decoded = TypeMeta::decode(&mut reader).unwrap();

		assert_eq!(decoded.user_type_id, Some(100));
		assert_eq!(decoded.fields.len(), 2);
		assert_eq!(decoded.fields[0].id.resolved_name(), "a");
		assert_eq!(decoded.fields[1].id.resolved_name(), "b");
		assert_eq!(decoded.body_hash, meta.body_hash_after_encode(&bytes));
	}

	#[test]
	fn round_trips_name_registered_struct_with_list_generic() {
		let list_of_int = TypeMetaFieldType {
			type_id: TypeId::List,
			nullable: false,
			track_ref: false,
			generics: vec![TypeMetaFieldType::scalar(TypeId::VarInt32, false, false)],
		};
		let meta = TypeMeta::by_name(
			"com.example",
			"Widget",
			true,
			vec![TypeMetaFieldInfo::named("items", list_of_int)],
		);
		let mut writer = Writer::new();
		meta.encode(&mut writer).unwrap();
		let bytes = writer.into_vec();
		let mut reader = Reader::new(&bytes);
		let decoded = TypeMeta::decode(&mut reader).unwrap();

		assert_eq!(decoded.namespace.as_deref(), Some("com.example"));
		assert_eq!(decoded.typename.as_deref(), Some("Widget"));
		assert_eq!(decoded.fields[0].field_type.type_id, TypeId::List);
		assert_eq!(
			decoded.fields[0].field_type.generics[0].type_id,
			TypeId::VarInt32
		);
	}

	#[test]
	fn round_trips_tagged_field() {
		let meta = TypeMeta::by_id(
			7,
			false,
			vec![TypeMetaFieldInfo::tagged(
				3,
				TypeMetaFieldType::scalar(TypeId::Int64, true, false),
			)],
		);
		let mut writer = Writer::new();
		meta.encode(&mut writer).unwrap();
		let bytes = writer.into_vec();
		let mut reader = Reader::new(&bytes);
		let decoded = TypeMeta::decode(&mut reader).unwrap();

		assert_eq!(decoded.fields[0].id.resolved_name(), "$tag3");
		assert!(decoded.fields[0].field_type.nullable);
	}

	#[test]
	fn encode_then_decode_yields_an_equal_type_meta() {
		let meta = TypeMeta::by_id(
			1,
			true,
			vec![TypeMetaFieldInfo::named(
				"a",
				TypeMetaFieldType::scalar(TypeId::VarInt32, false, false),
			)],
		);
		let mut writer = Writer::new();
		meta.encode(&mut writer).unwrap();
		let bytes = writer.into_vec();
		let decoded = TypeMeta::decode(&mut Reader::new(&bytes)).unwrap();

		assert_eq!(meta, decoded);
		assert_ne!(meta.body_hash, decoded.body_hash);
	}

	impl TypeMeta {
		fn body_hash_after_encode(&self, encoded: &[u8]) -> i64 {
			let mut reader = Reader::new(encoded);
			let header = reader.read_u64().unwrap();
			(header >> HEADER_HASH_SHIFT) as i64
		}
	}
}
