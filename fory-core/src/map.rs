//! Map container codec (spec §4.8, §4.9).
//!
//! Non-null entries are written in chunks of up to 255, each with its own
//! header byte (declared-key / declared-value bits at the exact positions
//! spec §4.8 names, mirroring `skip.rs`) and an 8-bit chunk size. A null key
//! or a null value breaks the current chunk and is written as its own
//! one-entry header (`KeyNull`/`ValueNull`), per spec §4.8's entry-shape
//! table; a value-type default (`DynValue::Null`, since this crate has no
//! richer default-value table to draw on) stands in for "the value-type's
//! default value" the spec names for a dropped null key.
//!
//! `TrackingKeyRef`/`TrackingValueRef` (bits 0/3) are not separate header
//! signals here: a declared key/value type's own `RefMode` (§4.4) already
//! decides whether `write_declared`/`read_declared` wrap an entry in a
//! ref-flag byte, so the behaviour those bits would otherwise select is
//! driven by the declared `TypeMetaFieldType` instead of a redundant header
//! flag. Declared non-nullable non-tracked scalar keys/values reduce to
//! exactly the simplified chunk shape spec §4.9 describes.

use std::cell::RefCell;
use std::rc::Rc;

use crate::any_value::{self, DynMap, DynValue, Shared};
use crate::context::{ReadContext, WriteContext};
use crate::error::{Error, Result};
use crate::meta::type_meta::TypeMetaFieldType;
use crate::types::TypeId;

// Bit positions match spec §4.8's table exactly (bit0/3 TrackingKey/ValueRef
// are unused by this implementation — see the module doc comment).
const KEY_NULL_BIT: u8 = 0b0000_0010; // bit1: KeyNull
const DECLARED_KEY_BIT: u8 = 0b0000_0100; // bit2: DeclaredKeyType
const VALUE_NULL_BIT: u8 = 0b0001_0000; // bit4: ValueNull
const DECLARED_VALUE_BIT: u8 = 0b0010_0000; // bit5: DeclaredValueType
const MAX_CHUNK: usize = 255;

fn write_entry(
	ctx: &mut WriteContext,
	value: &DynValue,
	declared: Option<&TypeMetaFieldType>,
) -> Result<()> {
	match declared {
		Some(field_type) => crate::serializer::write_declared(ctx, value, field_type),
		None => {
			let tag = any_value::wire_type_id_of(value);
			ctx.writer.write_u8(tag.as_u8());
			any_value::write_payload(ctx, value, tag, &[])
		}
	}
}

/// Flushes a buffered run of non-null entries as one chunk: header byte,
/// `u8 chunkSize`, then `chunkSize` key/value pairs (spec §4.8 "otherwise").
fn flush_chunk(
	ctx: &mut WriteContext,
	buffered: &mut Vec<(&DynValue, &DynValue)>,
	kv_types: Option<(&TypeMetaFieldType, &TypeMetaFieldType)>,
) -> Result<()> {
	if buffered.is_empty() {
		return Ok(());
	}
	let mut header = 0u8;
	if kv_types.is_some() {
		header |= DECLARED_KEY_BIT | DECLARED_VALUE_BIT;
	}
	ctx.writer.write_u8(header);
	ctx.writer.write_u8(buffered.len() as u8);
	for (key, value) in buffered.drain(..) {
		write_entry(ctx, key, kv_types.map(|(k, _)| k))?;
		write_entry(ctx, value, kv_types.map(|(_, v)| v))?;
	}
	Ok(())
}

/// Writes a map body: `varuint32 totalCount` then entries (spec §4.8). A
/// null key or null value breaks the run of buffered non-null entries and is
/// written as its own one-entry header with no `chunkSize` byte.
pub fn write_map(
	ctx: &mut WriteContext,
	map: &DynMap,
	kv_types: Option<(&TypeMetaFieldType, &TypeMetaFieldType)>,
) -> Result<()> {
	let total = map.count();
	ctx.writer.write_var_uint32(total as u32);
	if total == 0 {
		return Ok(());
	}

	if map.has_null {
		let null_value = map.null_value.as_deref().cloned().unwrap_or(DynValue::Null);
		if matches!(null_value, DynValue::Null) {
			ctx.writer.write_u8(KEY_NULL_BIT | VALUE_NULL_BIT);
		} else {
			let mut header = KEY_NULL_BIT;
			if kv_types.is_some() {
				header |= DECLARED_VALUE_BIT;
			}
			ctx.writer.write_u8(header);
			write_entry(ctx, &null_value, kv_types.map(|(_, v)| v))?;
		}
	}

	let mut buffered: Vec<(&DynValue, &DynValue)> = Vec::new();
	for (key, value) in map.snapshot() {
		if matches!(value, DynValue::Null) {
			flush_chunk(ctx, &mut buffered, kv_types)?;
			let mut header = VALUE_NULL_BIT;
			if kv_types.is_some() {
				header |= DECLARED_KEY_BIT;
			}
			ctx.writer.write_u8(header);
			write_entry(ctx, key, kv_types.map(|(k, _)| k))?;
			continue;
		}
		buffered.push((key, value));
		if buffered.len() == MAX_CHUNK {
			flush_chunk(ctx, &mut buffered, kv_types)?;
		}
	}
	flush_chunk(ctx, &mut buffered, kv_types)?;
	Ok(())
}

fn read_entry(
	ctx: &mut ReadContext<DynValue>,
	declared: Option<&TypeMetaFieldType>,
) -> Result<DynValue> {
	match declared {
		Some(field_type) => crate::serializer::read_declared(ctx, field_type),
		None => {
			let tag = ctx.reader.read_u8()?;
			let type_id =
				TypeId::from_repr(tag).ok_or_else(|| Error::invalid_data("unknown map entry TypeId"))?;
			any_value::read_payload(ctx, type_id, &[], None)
		}
	}
}

/// Fills an already-allocated shared map, entry by entry (spec §4.8). A
/// `KeyNull`/`ValueNull` header carries no `chunkSize` byte and contributes
/// exactly 1 to the read count; any other header starts a `chunkSize`-pair
/// chunk.
pub fn read_map_into(
	ctx: &mut ReadContext<DynValue>,
	shared: &Shared<DynMap>,
	kv_types: Option<(&TypeMetaFieldType, &TypeMetaFieldType)>,
) -> Result<()> {
	let total = ctx.reader.read_var_uint32()? as usize;
	let mut remaining = total;
	while remaining > 0 {
		let header = ctx.reader.read_u8()?;
		let null_key = header & KEY_NULL_BIT != 0;
		let null_value = header & VALUE_NULL_BIT != 0;
		let declared_key = header & DECLARED_KEY_BIT != 0;
		let declared_value = header & DECLARED_VALUE_BIT != 0;

		let key_declared = if declared_key {
			Some(
				kv_types
					.ok_or_else(|| Error::invalid_data("map chunk declares key type but none was provided"))?
					.0,
			)
		} else {
			None
		};
		let value_declared = if declared_value {
			Some(
				kv_types
					.ok_or_else(|| {
						Error::invalid_data("map chunk declares value type but none was provided")
					})?
					.1,
			)
		} else {
			None
		};

		if null_key && null_value {
			shared.borrow_mut().set(DynValue::Null, DynValue::Null);
			remaining -= 1;
			continue;
		}
		if null_key {
			let value = read_entry(ctx, value_declared)?;
			shared.borrow_mut().set(DynValue::Null, value);
			remaining -= 1;
			continue;
		}
		if null_value {
			let key = read_entry(ctx, key_declared)?;
			shared.borrow_mut().set(key, DynValue::Null);
			remaining -= 1;
			continue;
		}

		let chunk_size = ctx.reader.read_u8()? as usize;
		if chunk_size == 0 {
			return Err(Error::invalid_data("map chunkSize must not be zero"));
		}
		if chunk_size > remaining {
			return Err(Error::invalid_data("map chunk size exceeds remaining entry count"));
		}
		for _ in 0..chunk_size {
			let key = read_entry(ctx, key_declared)?;
			let value = read_entry(ctx, value_declared)?;
			shared.borrow_mut().set(key, value);
		}
		remaining -= chunk_size;
	}
	Ok(())
}

pub fn read_map(
	ctx: &mut ReadContext<DynValue>,
	key_type: Option<&TypeMetaFieldType>,
	value_type: Option<&TypeMetaFieldType>,
) -> Result<Shared<DynMap>> {
	let kv_types = match (key_type, value_type) {
		(Some(k), Some(v)) => Some((k, v)),
		_ => None,
	};
	let shared = Rc::new(RefCell::new(DynMap::new()));
	read_map_into(ctx, &shared, kv_types)?;
	Ok(shared)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::buffer::Reader;

	#[test]
	fn matches_spec_scenario_4_bytes() {
		// spec §8 scenario 4: Map<string,int> {"a":1}, hasGenerics=true.
		let key_type = TypeMetaFieldType::scalar(TypeId::String, false, false);
		let value_type = TypeMetaFieldType::scalar(TypeId::VarInt32, false, false);
		let mut map = DynMap::new();
		map.set(DynValue::String("a".into()), DynValue::Int32(1));

		let mut wctx = WriteContext::new(false, false, 32);
		write_map(&mut wctx, &map, Some((&key_type, &value_type))).unwrap();
		assert_eq!(
			wctx.writer.to_vec(),
			vec![0x01, 0x24, 0x01, 0x06, 0x61, 0x02]
		);
	}

	#[test]
	fn declared_string_to_int_map_round_trips() {
		let key_type = TypeMetaFieldType::scalar(TypeId::String, false, false);
		let value_type = TypeMetaFieldType::scalar(TypeId::VarInt32, false, false);

		let mut map = DynMap::new();
		map.set(DynValue::String("a".into()), DynValue::Int32(1));
		map.set(DynValue::String("b".into()), DynValue::Int32(2));

		let mut wctx = WriteContext::new(false, false, 32);
		write_map(&mut wctx, &map, Some((&key_type, &value_type))).unwrap();
		let bytes = wctx.writer.to_vec();

		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 32);
		let decoded = read_map(&mut rctx, Some(&key_type), Some(&value_type)).unwrap();
		assert_eq!(decoded.borrow().snapshot(), map.snapshot());
	}

	#[test]
	fn null_key_entry_round_trips_and_is_counted() {
		let mut map = DynMap::new();
		map.set(DynValue::Null, DynValue::Int32(9));
		map.set(DynValue::Int32(1), DynValue::Int32(2));

		let mut wctx = WriteContext::new(false, false, 32);
		write_map(&mut wctx, &map, None).unwrap();
		let bytes = wctx.writer.to_vec();

		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 32);
		let decoded = read_map(&mut rctx, None, None).unwrap();
		let decoded = decoded.borrow();
		assert!(decoded.has_null);
		assert_eq!(decoded.null_value.as_deref(), Some(&DynValue::Int32(9)));
		assert_eq!(decoded.count(), 2);
	}

	#[test]
	fn chunking_splits_large_maps_across_multiple_chunks() {
		let mut map = DynMap::new();
		for i in 0..300i32 {
			map.set(DynValue::Int32(i), DynValue::Int32(i * 2));
		}
		let mut wctx = WriteContext::new(false, false, 32);
		write_map(&mut wctx, &map, None).unwrap();
		let bytes = wctx.writer.to_vec();

		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 32);
		let decoded = read_map(&mut rctx, None, None).unwrap();
		assert_eq!(decoded.borrow().count(), 300);
	}

	#[test]
	fn null_key_and_null_value_pair_is_a_header_only_entry() {
		let mut map = DynMap::new();
		map.set(DynValue::Null, DynValue::Null);
		map.set(DynValue::Int32(1), DynValue::Int32(2));

		let mut wctx = WriteContext::new(false, false, 32);
		write_map(&mut wctx, &map, None).unwrap();
		let bytes = wctx.writer.to_vec();

		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 32);
		let decoded = read_map(&mut rctx, None, None).unwrap();
		let decoded = decoded.borrow();
		assert!(decoded.has_null);
		assert_eq!(decoded.null_value.as_deref(), Some(&DynValue::Null));
		assert_eq!(decoded.count(), 2);
	}

	#[test]
	fn null_value_entry_breaks_the_chunk_and_round_trips() {
		let mut map = DynMap::new();
		map.set(DynValue::Int32(1), DynValue::Int32(10));
		map.set(DynValue::Int32(2), DynValue::Null);
		map.set(DynValue::Int32(3), DynValue::Int32(30));

		let mut wctx = WriteContext::new(false, false, 32);
		write_map(&mut wctx, &map, None).unwrap();
		let bytes = wctx.writer.to_vec();

		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 32);
		let decoded = read_map(&mut rctx, None, None).unwrap();
		assert_eq!(decoded.borrow().snapshot(), map.snapshot());
	}

	#[test]
	fn zero_chunk_size_is_rejected() {
		let mut w = WriteContext::new(false, false, 32);
		w.writer.write_var_uint32(1);
		w.writer.write_u8(0); // chunk header, no null/declared bits
		w.writer.write_u8(0); // chunkSize == 0
		let bytes = w.writer.to_vec();

		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 32);
		assert!(read_map(&mut rctx, None, None).is_err());
	}
}
