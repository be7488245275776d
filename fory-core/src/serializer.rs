//! Declared-field ref wrapper and compatible-struct codec (spec §4.4-§4.5,
//! §4.11) — the seam tying the registry, reference tracker, container codecs
//! and any-value dispatch together.

use std::rc::Rc;

use crate::any_value::{self, DynStruct, DynValue};
use crate::context::{ReadContext, WriteContext};
use crate::error::{Error, Result};
use crate::meta::type_meta::TypeMetaFieldType;
use crate::meta::TypeMeta;
use crate::types::{RefFlag, RefMode};

/// Writes one declared field: the ref/null wrapper implied by
/// `(nullable, trackRef)`, then the payload (spec §3, §4.4).
pub fn write_declared(ctx: &mut WriteContext, value: &DynValue, field_type: &TypeMetaFieldType) -> Result<()> {
	let mode = RefMode::from_flags(field_type.nullable, ctx.track_ref && field_type.track_ref);

	match mode {
		RefMode::None => any_value::write_payload(ctx, value, field_type.type_id, &field_type.generics),
		RefMode::NullOnly => {
			if matches!(value, DynValue::Null) {
				ctx.writer.write_i8(RefFlag::Null as i8);
				Ok(())
			} else {
				ctx.writer.write_i8(RefFlag::NotNullValue as i8);
				any_value::write_payload(ctx, value, field_type.type_id, &field_type.generics)
			}
		}
		RefMode::Tracking => match any_value::shared_identity(value) {
			Some(identity) => match ctx.ref_writer.try_write_reference(identity) {
				Some(existing_id) => {
					ctx.writer.write_i8(RefFlag::Ref as i8);
					ctx.writer.write_var_uint32(existing_id);
					Ok(())
				}
				None => {
					ctx.writer.write_i8(RefFlag::RefValue as i8);
					any_value::write_payload(ctx, value, field_type.type_id, &field_type.generics)
				}
			},
			None if matches!(value, DynValue::Null) => {
				ctx.writer.write_i8(RefFlag::Null as i8);
				Ok(())
			}
			None => {
				ctx.writer.write_i8(RefFlag::NotNullValue as i8);
				any_value::write_payload(ctx, value, field_type.type_id, &field_type.generics)
			}
		},
	}
}

pub fn read_declared(ctx: &mut ReadContext<DynValue>, field_type: &TypeMetaFieldType) -> Result<DynValue> {
	let mode = RefMode::from_flags(field_type.nullable, ctx.track_ref && field_type.track_ref);

	let reserved_id = match mode {
		RefMode::None => None,
		RefMode::NullOnly => {
			let flag = RefFlag::from_repr(ctx.reader.read_i8()?)
				.ok_or_else(|| Error::ref_error("invalid null-flag byte"))?;
			match flag {
				RefFlag::Null => return Ok(DynValue::Null),
				RefFlag::NotNullValue => None,
				_ => return Err(Error::ref_error("unexpected RefFlag in nullable-only field")),
			}
		}
		RefMode::Tracking => {
			let flag = RefFlag::from_repr(ctx.reader.read_i8()?)
				.ok_or_else(|| Error::ref_error("invalid RefFlag byte"))?;
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
		}
	};

	any_value::read_payload(ctx, field_type.type_id, &field_type.generics, reserved_id)
}

/// Writes a struct's own `TypeMeta` followed by every field's value, in
/// schema order (spec §4.3, §4.5). The writer always emits its full schema;
/// the asymmetry with an older reader is resolved on the read side.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn write_struct(ctx: &mut WriteContext, value: &DynStruct) -> Result<()> {
	ctx.enter_nested()?;
	value.type_meta.encode(&mut ctx.writer)?;
	for field in &value.type_meta.fields {
		let name = field.id.resolved_name();
		let field_value = value
			.get(&name)
			.ok_or_else(|| Error::invalid_data(format!("struct value missing field '{name}'")))?;
		write_declared(ctx, field_value, &field.field_type)?;
	}
	ctx.exit_nested();
	Ok(())
}

/// Reads a self-describing struct: decodes the wire `TypeMeta`, then every
/// field it names, none skipped (spec §4.3). Used by the any-value dynamic
/// dispatch, where there is no separate local schema to reconcile against.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn read_struct(ctx: &mut ReadContext<DynValue>) -> Result<DynStruct> {
	ctx.enter_nested()?;
	let type_meta = TypeMeta::decode(&mut ctx.reader)?;
	let result = read_struct_fields(ctx, type_meta, None);
	ctx.exit_nested();
	result
}

/// Reads every field of an externally-supplied schema — no wire `TypeMeta`
/// to decode, because the caller already has it: either it was resolved from
/// a `Registry` by id/name, or it was decoded as part of a dynamic type
/// prefix (spec §4.5, §4.6).
pub fn read_struct_with_meta(ctx: &mut ReadContext<DynValue>, type_meta: TypeMeta) -> Result<DynStruct> {
	ctx.enter_nested()?;
	let result = read_struct_fields(ctx, type_meta, None);
	ctx.exit_nested();
	result
}

/// Reads a compatible struct against a caller-known local field set: fields
/// present in `known_fields` are decoded, everything else the wire schema
/// names is discarded via the field skipper (spec §4.11).
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn read_compatible_struct(
	ctx: &mut ReadContext<DynValue>,
	known_fields: &[&str],
) -> Result<DynStruct> {
	ctx.enter_nested()?;
	let type_meta = TypeMeta::decode(&mut ctx.reader)?;
	let result = read_struct_fields(ctx, type_meta, Some(known_fields));
	ctx.exit_nested();
	result
}

fn read_struct_fields(
	ctx: &mut ReadContext<DynValue>,
	type_meta: TypeMeta,
	known_fields: Option<&[&str]>,
) -> Result<DynStruct> {
	let mut fields = Vec::new();
	for field in &type_meta.fields {
		let name = field.id.resolved_name();
		let keep = match known_fields {
			Some(known) => known.contains(&name.as_str()),
			None => true,
		};
		if keep {
			let value = read_declared(ctx, &field.field_type)?;
			fields.push((name, value));
		} else {
			crate::skip::skip_field(&mut ctx.reader, ctx.track_ref, &field.field_type)?;
		}
	}
	Ok(DynStruct {
		type_meta: Rc::new(type_meta),
		fields,
	})
}
