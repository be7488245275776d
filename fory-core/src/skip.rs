//! Field skipper: consumes and discards an unknown compatible-struct field's
//! payload without constructing a value (spec §4.11).

use crate::buffer::Reader;
use crate::error::{Error, Result};
use crate::meta::type_meta::TypeMetaFieldType;
use crate::types::{RefFlag, TypeId};

/// Skips one field's wire payload, using its declared type from the writer's
/// `TypeMeta` to know its shape. `track_ref` is the reading context's flag —
/// a RefFlag byte is only on the wire when it *and* the field's own
/// `track_ref` are both set, mirroring `read_declared`'s gate exactly.
pub fn skip_field(reader: &mut Reader, track_ref: bool, field_type: &TypeMetaFieldType) -> Result<()> {
	if track_ref && field_type.track_ref {
		let flag = RefFlag::from_repr(reader.read_i8()?)
			.ok_or_else(|| Error::ref_error("invalid RefFlag byte while skipping"))?;
		match flag {
			RefFlag::Null => return Ok(()),
			RefFlag::Ref => {
				reader.read_var_uint32()?;
				return Ok(());
			}
			RefFlag::RefValue | RefFlag::NotNullValue => {}
		}
	} else if field_type.nullable {
		let flag = RefFlag::from_repr(reader.read_i8()?)
			.ok_or_else(|| Error::ref_error("invalid null-flag byte while skipping"))?;
		match flag {
			RefFlag::Null => return Ok(()),
			RefFlag::NotNullValue => {}
			_ => return Err(Error::ref_error("unexpected RefFlag in nullable-only field")),
		}
	}

	skip_payload(reader, track_ref, field_type)
}

fn skip_payload(reader: &mut Reader, track_ref: bool, field_type: &TypeMetaFieldType) -> Result<()> {
	match field_type.type_id {
		TypeId::Bool | TypeId::Int8 | TypeId::UInt8 => {
			reader.skip(1)?;
		}
		TypeId::Int16 | TypeId::UInt16 => {
			reader.skip(2)?;
		}
		TypeId::Int32 | TypeId::UInt32 | TypeId::Float32 | TypeId::Date => {
			reader.skip(4)?;
		}
		TypeId::Int64 | TypeId::UInt64 | TypeId::Float64 => {
			reader.skip(8)?;
		}
		TypeId::Timestamp | TypeId::Duration => {
			reader.skip(12)?;
		}
		TypeId::VarInt32 | TypeId::VarUInt32 => {
			reader.read_var_uint32()?;
		}
		TypeId::VarInt64 | TypeId::VarUInt64 => {
			reader.read_var_uint64()?;
		}
		TypeId::TaggedInt64 | TypeId::TaggedUInt64 => {
			reader.read_tagged_uint64()?;
		}
		TypeId::String => {
			let header = reader.read_var_uint36_small()?;
			reader.skip((header >> 2) as usize)?;
		}
		TypeId::Binary => {
			let len = reader.read_var_uint32()? as usize;
			reader.skip(len)?;
		}
		TypeId::Enum | TypeId::NamedEnum => {
			reader.read_var_uint32()?;
		}
		// §4.11 names a closed set of supported compatible field types:
		// primitives, string, enum ordinal, List<string>, Set<string>,
		// Map<string,string> and Union. Union machinery is out of scope (see
		// DESIGN.md); everything outside that set is `InvalidData`.
		TypeId::List | TypeId::Set if is_string_element(field_type) => {
			skip_collection(reader, track_ref, field_type)?;
		}
		TypeId::Map if is_string_keyed_and_valued(field_type) => {
			skip_map(reader, track_ref, field_type)?;
		}
		_ => {
			return Err(Error::invalid_data("unsupported compatible field type"));
		}
	}
	Ok(())
}

fn is_string_element(field_type: &TypeMetaFieldType) -> bool {
	matches!(
		field_type.generics.first(),
		Some(g) if g.type_id == TypeId::String
	)
}

fn is_string_keyed_and_valued(field_type: &TypeMetaFieldType) -> bool {
	matches!(field_type.generics.first(), Some(g) if g.type_id == TypeId::String)
		&& matches!(field_type.generics.get(1), Some(g) if g.type_id == TypeId::String)
}

fn skip_collection(reader: &mut Reader, track_ref: bool, field_type: &TypeMetaFieldType) -> Result<()> {
	let len = reader.read_var_uint32()? as usize;
	if len == 0 {
		return Ok(());
	}
	let header = reader.read_u8()?;
	let declared_element_type = header & 0b0100 != 0;
	let same_type = header & 0b1000 != 0;

	let element_type = if same_type && declared_element_type {
		field_type
			.generics
			.first()
			.cloned()
			.ok_or_else(|| Error::invalid_data("missing declared element type while skipping"))?
	} else if same_type {
		let id = reader.read_u8()?;
		TypeMetaFieldType::scalar(
			TypeId::from_repr(id).ok_or_else(|| Error::invalid_data("unknown element TypeId"))?,
			false,
			false,
		)
	} else {
		field_type
			.generics
			.first()
			.cloned()
			.unwrap_or_else(|| TypeMetaFieldType::scalar(TypeId::Unknown, true, false))
	};

	for _ in 0..len {
		if same_type {
			skip_field(reader, track_ref, &element_type)?;
		} else {
			let tag = reader.read_u8()?;
			let tagged = TypeMetaFieldType::scalar(
				TypeId::from_repr(tag).ok_or_else(|| Error::invalid_data("unknown dynamic element TypeId"))?,
				false,
				false,
			);
			skip_payload(reader, track_ref, &tagged)?;
		}
	}
	Ok(())
}

/// Skips one map key or value: its declared field if `declared`, otherwise a
/// dynamic `tag + payload` pair (spec §4.8).
fn skip_map_entry_half(
	reader: &mut Reader,
	track_ref: bool,
	declared_type: &TypeMetaFieldType,
	declared: bool,
) -> Result<()> {
	if declared {
		skip_field(reader, track_ref, declared_type)
	} else {
		let tag = reader.read_u8()?;
		let tagged = TypeMetaFieldType::scalar(
			TypeId::from_repr(tag).ok_or_else(|| Error::invalid_data("unknown dynamic map entry TypeId"))?,
			false,
			false,
		);
		skip_payload(reader, track_ref, &tagged)
	}
}

fn skip_map(reader: &mut Reader, track_ref: bool, field_type: &TypeMetaFieldType) -> Result<()> {
	let total_len = reader.read_var_uint32()? as usize;
	let key_type = field_type
		.generics
		.first()
		.cloned()
		.unwrap_or_else(|| TypeMetaFieldType::scalar(TypeId::Unknown, true, false));
	let value_type = field_type
		.generics
		.get(1)
		.cloned()
		.unwrap_or_else(|| TypeMetaFieldType::scalar(TypeId::Unknown, true, false));

	let mut remaining = total_len;
	while remaining > 0 {
		let header = reader.read_u8()?;
		// Bit positions mirror `map.rs`'s KEY_NULL_BIT/DECLARED_KEY_BIT/VALUE_NULL_BIT/DECLARED_VALUE_BIT.
		let null_key = header & 0b0000_0010 != 0;
		let null_value = header & 0b0001_0000 != 0;
		let declared_key = header & 0b0000_0100 != 0;
		let declared_value = header & 0b0010_0000 != 0;

		if null_key && null_value {
			remaining -= 1;
			continue;
		}
		if null_key {
			skip_map_entry_half(reader, track_ref, &value_type, declared_value)?;
			remaining -= 1;
			continue;
		}
		if null_value {
			skip_map_entry_half(reader, track_ref, &key_type, declared_key)?;
			remaining -= 1;
			continue;
		}

		let chunk_size = reader.read_u8()? as usize;
		for _ in 0..chunk_size {
			skip_map_entry_half(reader, track_ref, &key_type, declared_key)?;
			skip_map_entry_half(reader, track_ref, &value_type, declared_value)?;
		}
		remaining -= chunk_size;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::buffer::Writer;
	use crate::primitive;

	#[test]
	fn skips_a_string_field_leaving_cursor_at_payload_end() {
		let mut w = Writer::new();
		primitive::write_string(&mut w, "discarded").unwrap();
		w.write_u8(0xAB); // sentinel following the field
		let bytes = w.to_vec();

		let mut r = Reader::new(&bytes);
		let field_type = TypeMetaFieldType::scalar(TypeId::String, false, false);
		skip_field(&mut r, false, &field_type).unwrap();
		assert_eq!(r.read_u8().unwrap(), 0xAB);
	}

	#[test]
	fn skips_a_nullable_int_field() {
		let mut w = Writer::new();
		w.write_i8(RefFlag::NotNullValue as i8);
		w.write_var_uint32(7);
		let bytes = w.to_vec();
		let mut r = Reader::new(&bytes);
		let field_type = TypeMetaFieldType::scalar(TypeId::VarUInt32, true, false);
		skip_field(&mut r, false, &field_type).unwrap();
		assert_eq!(r.remaining(), 0);
	}

	#[test]
	fn skips_a_tracked_field_without_a_ref_flag_when_the_context_has_ref_tracking_off() {
		// field_type.track_ref=true but the reading context's track_ref=false:
		// write_declared/read_declared gate on `ctx.track_ref && field_type.track_ref`,
		// so no RefFlag byte is on the wire here and the skipper must not read one.
		let mut w = Writer::new();
		w.write_var_uint32(9);
		w.write_u8(0xAB); // sentinel following the field
		let bytes = w.to_vec();

		let mut r = Reader::new(&bytes);
		let field_type = TypeMetaFieldType::scalar(TypeId::VarUInt32, false, true);
		skip_field(&mut r, false, &field_type).unwrap();
		assert_eq!(r.read_u8().unwrap(), 0xAB);
	}

	#[test]
	fn skips_a_declared_string_to_int_map_written_by_map_rs() {
		use crate::any_value::DynValue;
		use crate::context::WriteContext;

		let key_type = TypeMetaFieldType::scalar(TypeId::String, false, false);
		let value_type = TypeMetaFieldType::scalar(TypeId::String, false, false);
		let mut map = crate::any_value::DynMap::new();
		map.set(DynValue::String("a".into()), DynValue::String("1".into()));
		map.set(DynValue::String("b".into()), DynValue::String("2".into()));

		let mut wctx = WriteContext::new(false, false, 32);
		crate::map::write_map(&mut wctx, &map, Some((&key_type, &value_type))).unwrap();
		wctx.writer.write_u8(0xAB); // sentinel following the field
		let bytes = wctx.writer.to_vec();

		let mut r = Reader::new(&bytes);
		let field_type = TypeMetaFieldType {
			type_id: TypeId::Map,
			nullable: false,
			track_ref: false,
			generics: vec![key_type, value_type],
		};
		skip_field(&mut r, false, &field_type).unwrap();
		assert_eq!(r.read_u8().unwrap(), 0xAB);
	}

	#[test]
	fn skips_a_declared_map_with_a_null_value_entry() {
		use crate::any_value::DynValue;
		use crate::context::WriteContext;

		let key_type = TypeMetaFieldType::scalar(TypeId::String, false, false);
		let value_type = TypeMetaFieldType::scalar(TypeId::String, false, false);
		let mut map = crate::any_value::DynMap::new();
		map.set(DynValue::String("a".into()), DynValue::Null);
		map.set(DynValue::String("b".into()), DynValue::String("2".into()));

		let mut wctx = WriteContext::new(false, false, 32);
		crate::map::write_map(&mut wctx, &map, Some((&key_type, &value_type))).unwrap();
		wctx.writer.write_u8(0xAB);
		let bytes = wctx.writer.to_vec();

		let mut r = Reader::new(&bytes);
		let field_type = TypeMetaFieldType {
			type_id: TypeId::Map,
			nullable: false,
			track_ref: false,
			generics: vec![key_type, value_type],
		};
		skip_field(&mut r, false, &field_type).unwrap();
		assert_eq!(r.read_u8().unwrap(), 0xAB);
	}
}
