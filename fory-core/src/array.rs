//! Primitive-array fast path (spec §4.7, "Arrays of primitives").
//!
//! Distinct from the primitive *list* fast path in `collection.rs`: an array
//! carries a `varuint32` payload-size-in-bytes prefix and fixed-width
//! little-endian elements so the payload can be memcpy-sliced, whereas a
//! primitive list uses variable-width (varint/zigzag) element encoding.

use crate::buffer::{Reader, Writer};
use crate::error::{Error, Result};
use crate::types::TypeId;

/// A typed primitive array — the host value behind `TypeId::{Bool,Int8,...}Array`.
/// `Float8`/`Float16`/`BFloat16` arrays are reserved wire kinds with no codec
/// (spec §9 Open Questions) and have no variant here.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveArray {
	Bool(Vec<bool>),
	Int8(Vec<i8>),
	Int16(Vec<i16>),
	Int32(Vec<i32>),
	Int64(Vec<i64>),
	UInt8(Vec<u8>),
	UInt16(Vec<u16>),
	UInt32(Vec<u32>),
	UInt64(Vec<u64>),
	Float32(Vec<f32>),
	Float64(Vec<f64>),
}

impl PrimitiveArray {
	pub fn type_id(&self) -> TypeId {
		match self {
			PrimitiveArray::Bool(_) => TypeId::BoolArray,
			PrimitiveArray::Int8(_) => TypeId::Int8Array,
			PrimitiveArray::Int16(_) => TypeId::Int16Array,
			PrimitiveArray::Int32(_) => TypeId::Int32Array,
			PrimitiveArray::Int64(_) => TypeId::Int64Array,
			PrimitiveArray::UInt8(_) => TypeId::UInt8Array,
			PrimitiveArray::UInt16(_) => TypeId::UInt16Array,
			PrimitiveArray::UInt32(_) => TypeId::UInt32Array,
			PrimitiveArray::UInt64(_) => TypeId::UInt64Array,
			PrimitiveArray::Float32(_) => TypeId::Float32Array,
			PrimitiveArray::Float64(_) => TypeId::Float64Array,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			PrimitiveArray::Bool(v) => v.len(),
			PrimitiveArray::Int8(v) => v.len(),
			PrimitiveArray::Int16(v) => v.len(),
			PrimitiveArray::Int32(v) => v.len(),
			PrimitiveArray::Int64(v) => v.len(),
			PrimitiveArray::UInt8(v) => v.len(),
			PrimitiveArray::UInt16(v) => v.len(),
			PrimitiveArray::UInt32(v) => v.len(),
			PrimitiveArray::UInt64(v) => v.len(),
			PrimitiveArray::Float32(v) => v.len(),
			PrimitiveArray::Float64(v) => v.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

fn element_width(type_id: TypeId) -> Result<usize> {
	match type_id {
		TypeId::BoolArray | TypeId::Int8Array | TypeId::UInt8Array => Ok(1),
		TypeId::Int16Array | TypeId::UInt16Array => Ok(2),
		TypeId::Int32Array | TypeId::UInt32Array | TypeId::Float32Array => Ok(4),
		TypeId::Int64Array | TypeId::UInt64Array | TypeId::Float64Array => Ok(8),
		TypeId::Float8Array | TypeId::Float16Array | TypeId::BFloat16Array => Err(
			Error::invalid_data("Float8/Float16/BFloat16 array codecs are not implemented"),
		),
		other => Err(Error::invalid_data(format!("{other:?} is not an array TypeId"))),
	}
}

/// Writes `varuint32 payloadBytes` then fixed-width little-endian elements,
/// no per-element varint and no length/count field of its own (the byte
/// count doubles as the element count once divided by the fixed width).
pub fn write_array(writer: &mut Writer, array: &PrimitiveArray) {
	writer.write_var_uint32((array.len() * element_width(array.type_id()).unwrap()) as u32);
	match array {
		PrimitiveArray::Bool(v) => v.iter().for_each(|b| writer.write_u8(*b as u8)),
		PrimitiveArray::Int8(v) => v.iter().for_each(|b| writer.write_i8(*b)),
		PrimitiveArray::UInt8(v) => writer.write_bytes(v),
		PrimitiveArray::Int16(v) => v.iter().for_each(|b| writer.write_i16(*b)),
		PrimitiveArray::UInt16(v) => v.iter().for_each(|b| writer.write_u16(*b)),
		PrimitiveArray::Int32(v) => v.iter().for_each(|b| writer.write_i32(*b)),
		PrimitiveArray::UInt32(v) => v.iter().for_each(|b| writer.write_u32(*b)),
		PrimitiveArray::Int64(v) => v.iter().for_each(|b| writer.write_i64(*b)),
		PrimitiveArray::UInt64(v) => v.iter().for_each(|b| writer.write_u64(*b)),
		PrimitiveArray::Float32(v) => v.iter().for_each(|b| writer.write_f32(*b)),
		PrimitiveArray::Float64(v) => v.iter().for_each(|b| writer.write_f64(*b)),
	}
}

pub fn read_array(reader: &mut Reader, type_id: TypeId) -> Result<PrimitiveArray> {
	let width = element_width(type_id)?;
	let payload_len = reader.read_var_uint32()? as usize;
	if !payload_len.is_multiple_of(width) {
		return Err(Error::invalid_data(
			"array payload length is not a multiple of its element width",
		));
	}
	let count = payload_len / width;
	Ok(match type_id {
		TypeId::BoolArray => {
			let mut v = Vec::with_capacity(count);
			for _ in 0..count {
				v.push(reader.read_u8()? != 0);
			}
			PrimitiveArray::Bool(v)
		}
		TypeId::Int8Array => {
			let mut v = Vec::with_capacity(count);
			for _ in 0..count {
				v.push(reader.read_i8()?);
			}
			PrimitiveArray::Int8(v)
		}
		TypeId::UInt8Array => PrimitiveArray::UInt8(reader.read_bytes(count)?),
		TypeId::Int16Array => {
			let mut v = Vec::with_capacity(count);
			for _ in 0..count {
				v.push(reader.read_i16()?);
			}
			PrimitiveArray::Int16(v)
		}
		TypeId::UInt16Array => {
			let mut v = Vec::with_capacity(count);
			for _ in 0..count {
				v.push(reader.read_u16()?);
			}
			PrimitiveArray::UInt16(v)
		}
		TypeId::Int32Array => {
			let mut v = Vec::with_capacity(count);
			for _ in 0..count {
				v.push(reader.read_i32()?);
			}
			PrimitiveArray::Int32(v)
		}
		TypeId::UInt32Array => {
			let mut v = Vec::with_capacity(count);
			for _ in 0..count {
				v.push(reader.read_u32()?);
			}
			PrimitiveArray::UInt32(v)
		}
		TypeId::Int64Array => {
			let mut v = Vec::with_capacity(count);
			for _ in 0..count {
				v.push(reader.read_i64()?);
			}
			PrimitiveArray::Int64(v)
		}
		TypeId::UInt64Array => {
			let mut v = Vec::with_capacity(count);
			for _ in 0..count {
				v.push(reader.read_u64()?);
			}
			PrimitiveArray::UInt64(v)
		}
		TypeId::Float32Array => {
			let mut v = Vec::with_capacity(count);
			for _ in 0..count {
				v.push(reader.read_f32()?);
			}
			PrimitiveArray::Float32(v)
		}
		TypeId::Float64Array => {
			let mut v = Vec::with_capacity(count);
			for _ in 0..count {
				v.push(reader.read_f64()?);
			}
			PrimitiveArray::Float64(v)
		}
		other => return Err(Error::invalid_data(format!("{other:?} is not an array TypeId"))),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn round_trip(array: PrimitiveArray) {
		let mut w = Writer::new();
		write_array(&mut w, &array);
		let bytes = w.to_vec();
		let mut r = Reader::new(&bytes);
		assert_eq!(read_array(&mut r, array.type_id()).unwrap(), array);
		assert_eq!(r.remaining(), 0);
	}

	#[test]
	fn int32_array_round_trips() {
		round_trip(PrimitiveArray::Int32(vec![1, -1, 2, i32::MIN, i32::MAX]));
	}

	#[test]
	fn float64_array_round_trips() {
		round_trip(PrimitiveArray::Float64(vec![1.5, -2.25, 0.0]));
	}

	#[test]
	fn bool_array_round_trips() {
		round_trip(PrimitiveArray::Bool(vec![true, false, true]));
	}

	#[test]
	fn uint8_array_is_a_raw_memcpy() {
		let mut w = Writer::new();
		write_array(&mut w, &PrimitiveArray::UInt8(vec![1, 2, 3]));
		assert_eq!(w.to_vec(), vec![0x03, 1, 2, 3]);
	}

	#[test]
	fn empty_array_writes_a_zero_length_prefix() {
		let mut w = Writer::new();
		write_array(&mut w, &PrimitiveArray::Int32(vec![]));
		assert_eq!(w.to_vec(), vec![0x00]);
	}

	#[test]
	fn reserved_float_array_kinds_are_rejected() {
		let mut r = Reader::new(&[0x00]);
		assert!(read_array(&mut r, TypeId::Float16Array).is_err());
	}

	#[test]
	fn payload_length_must_align_to_element_width() {
		let mut r = Reader::new(&[0x03, 0, 0, 0]);
		assert!(read_array(&mut r, TypeId::Int32Array).is_err());
	}
}
