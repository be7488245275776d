//! List/Set container codec (spec §4.7).
//!
//! Header bit layout mirrors the field skipper in `skip.rs`: bit2 marks a
//! declared element type, bit3 marks a homogeneous (same-type) run. The
//! remaining bits are unused by this implementation.
//!
//! The same-type run doubles as the "primitive collection" fast path (spec
//! §2.10/§4.7): when the element is a fixed-or-varint scalar that is never
//! null, elements are written as raw payloads with no per-element ref/null
//! byte — `is_primitive_fast_path` decides this identically on both sides
//! from the (already-agreed) element `TypeId` and its declared nullability,
//! so no extra wire bit is needed to signal it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::any_value::{self, DynValue, Shared};
use crate::context::{ReadContext, WriteContext};
use crate::error::{Error, Result};
use crate::meta::type_meta::TypeMetaFieldType;
use crate::types::TypeId;

const DECLARED_ELEMENT_TYPE_BIT: u8 = 0b0100;
const SAME_TYPE_BIT: u8 = 0b1000;

fn all_same_wire_type(items: &[DynValue]) -> bool {
	match items.first() {
		None => true,
		Some(first) => {
			let tag = any_value::wire_type_id_of(first);
			items.iter().all(|item| any_value::wire_type_id_of(item) == tag)
		}
	}
}

/// Whether `tag`'s elements can take the "primitive collection" fast path
/// (spec §4.7/§2.10): a fixed-or-varint-but-homogeneous scalar with no
/// per-element null/tracking machinery. Only valid when the element is
/// statically known to never be null — scalars are never reference-trackable
/// in the first place (spec §3 invariants), so `trackRef` never applies here.
fn is_primitive_fast_path(tag: TypeId, declared_nullable: bool) -> bool {
	tag.is_primitive() && !declared_nullable
}

/// Writes a list or set body: `varuint32 len [header [elementTag]] elements`.
/// `elem_type` is the declared generic element type, when the enclosing
/// field/collection declares one.
pub fn write_collection(
	ctx: &mut WriteContext,
	items: &[DynValue],
	elem_type: Option<&TypeMetaFieldType>,
	_is_set: bool,
) -> Result<()> {
	ctx.writer.write_var_uint32(items.len() as u32);
	if items.is_empty() {
		return Ok(());
	}

	let same_type = elem_type.is_some() || all_same_wire_type(items);
	let mut header = 0u8;
	if same_type {
		header |= SAME_TYPE_BIT;
	}
	if elem_type.is_some() {
		header |= DECLARED_ELEMENT_TYPE_BIT;
	}
	ctx.writer.write_u8(header);

	let inferred_tag = same_type.then(|| any_value::wire_type_id_of(&items[0]));
	let tag = elem_type.map(|d| d.type_id).or(inferred_tag);
	if same_type && elem_type.is_none() {
		ctx.writer.write_u8(tag.unwrap().as_u8());
	}

	let declared_nullable = elem_type.map(|d| d.nullable).unwrap_or(false);
	let fast_path = same_type && is_primitive_fast_path(tag.unwrap(), declared_nullable);

	for item in items {
		if fast_path {
			any_value::write_payload(ctx, item, tag.unwrap(), &[])?;
		} else if same_type {
			let owned_scalar;
			let field_type = match elem_type {
				Some(declared) => declared,
				None => {
					// Non-primitive inferred element (e.g. nested containers/structs):
					// still reference-trackable, so keep `trackRef` contagious.
					owned_scalar = TypeMetaFieldType::scalar(tag.unwrap(), false, true);
					&owned_scalar
				}
			};
			crate::serializer::write_declared(ctx, item, field_type)?;
		} else {
			let elem_tag = any_value::wire_type_id_of(item);
			ctx.writer.write_u8(elem_tag.as_u8());
			any_value::write_payload(ctx, item, elem_tag, &[])?;
		}
	}
	Ok(())
}

/// Fills an already-allocated shared vector — used on the ref-tracked read
/// path so a cyclic self-reference inside the elements resolves to the same
/// cell (spec §4.4).
pub fn read_collection_into(
	ctx: &mut ReadContext<DynValue>,
	shared: &Shared<Vec<DynValue>>,
	elem_type: Option<&TypeMetaFieldType>,
) -> Result<()> {
	let len = ctx.reader.read_var_uint32()? as usize;
	if len == 0 {
		return Ok(());
	}
	let header = ctx.reader.read_u8()?;
	let declared = header & DECLARED_ELEMENT_TYPE_BIT != 0;
	let same_type = header & SAME_TYPE_BIT != 0;

	let resolved_elem_type = if same_type && declared {
		Some(
			elem_type
				.cloned()
				.ok_or_else(|| Error::invalid_data("missing declared element type"))?,
		)
	} else if same_type {
		let tag = ctx.reader.read_u8()?;
		let type_id =
			TypeId::from_repr(tag).ok_or_else(|| Error::invalid_data("unknown element TypeId"))?;
		// Mirrors the write side: `trackRef` stays contagious for non-primitive
		// inferred elements, off for primitives (never reference-trackable).
		Some(TypeMetaFieldType::scalar(type_id, false, !type_id.is_primitive()))
	} else {
		None
	};

	let fast_path = resolved_elem_type
		.as_ref()
		.is_some_and(|ft| is_primitive_fast_path(ft.type_id, ft.nullable));

	for _ in 0..len {
		let value = if fast_path {
			any_value::read_payload(ctx, resolved_elem_type.as_ref().unwrap().type_id, &[], None)?
		} else if let Some(field_type) = &resolved_elem_type {
			crate::serializer::read_declared(ctx, field_type)?
		} else {
			let tag = ctx.reader.read_u8()?;
			let type_id = TypeId::from_repr(tag)
				.ok_or_else(|| Error::invalid_data("unknown dynamic element TypeId"))?;
			any_value::read_payload(ctx, type_id, &[], None)?
		};
		shared.borrow_mut().push(value);
	}
	Ok(())
}

pub fn read_collection(
	ctx: &mut ReadContext<DynValue>,
	elem_type: Option<&TypeMetaFieldType>,
) -> Result<Shared<Vec<DynValue>>> {
	let shared = Rc::new(RefCell::new(Vec::new()));
	read_collection_into(ctx, &shared, elem_type)?;
	Ok(shared)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::buffer::Reader;

	fn list(items: Vec<DynValue>) -> Shared<Vec<DynValue>> {
		Rc::new(RefCell::new(items))
	}

	#[test]
	fn homogeneous_declared_list_round_trips() {
		let elem_type = TypeMetaFieldType::scalar(TypeId::VarInt32, false, false);
		let items = vec![DynValue::Int32(1), DynValue::Int32(2), DynValue::Int32(3)];

		let mut wctx = WriteContext::new(false, false, 32);
		write_collection(&mut wctx, &items, Some(&elem_type), false).unwrap();
		let bytes = wctx.writer.to_vec();

		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 32);
		let decoded = read_collection(&mut rctx, Some(&elem_type)).unwrap();
		assert_eq!(*decoded.borrow(), items);
	}

	#[test]
	fn heterogeneous_list_round_trips() {
		let items = vec![DynValue::Int32(1), DynValue::String("x".into())];
		let mut wctx = WriteContext::new(false, false, 32);
		write_collection(&mut wctx, &items, None, false).unwrap();
		let bytes = wctx.writer.to_vec();
		assert_eq!(
			bytes,
			vec![0x02, 0x00, 0x05, 0x02, 0x15, 0x06, 0x78]
		);

		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 32);
		let decoded = read_collection(&mut rctx, None).unwrap();
		assert_eq!(*decoded.borrow(), items);
	}

	#[test]
	fn empty_collection_writes_only_length() {
		let mut wctx = WriteContext::new(false, false, 32);
		write_collection(&mut wctx, &[], None, false).unwrap();
		assert_eq!(wctx.writer.to_vec(), vec![0x00]);
		let _ = list(vec![]);
	}

	#[test]
	fn track_ref_does_not_pollute_an_inferred_primitive_list() {
		// Same encoded bytes whether `ctx.track_ref` is on or off: primitive
		// scalars are never reference-trackable (spec §3), so a homogeneous
		// int list takes the raw fast path regardless (spec §4.7/§2.10).
		let items = vec![DynValue::Int32(1), DynValue::Int32(2)];

		let mut untracked = WriteContext::new(false, false, 32);
		write_collection(&mut untracked, &items, None, false).unwrap();

		let mut tracked = WriteContext::new(true, false, 32);
		write_collection(&mut tracked, &items, None, false).unwrap();

		assert_eq!(untracked.writer.to_vec(), tracked.writer.to_vec());
	}

	#[test]
	fn nullable_declared_primitive_list_still_round_trips_nulls() {
		let elem_type = TypeMetaFieldType::scalar(TypeId::VarInt32, true, false);
		let items = vec![DynValue::Int32(1), DynValue::Null, DynValue::Int32(3)];

		let mut wctx = WriteContext::new(false, false, 32);
		write_collection(&mut wctx, &items, Some(&elem_type), false).unwrap();
		let bytes = wctx.writer.to_vec();

		let mut rctx: ReadContext<DynValue> = ReadContext::new(Reader::new(&bytes), false, false, 32);
		let decoded = read_collection(&mut rctx, Some(&elem_type)).unwrap();
		assert_eq!(*decoded.borrow(), items);
	}
}
