//! Bounded little-endian byte reader (spec §4.1, §6.1).
//!
//! Grounded in the teacher's `FromByteStream`/`read_compressed_u32` pair
//! (`utilities.rs`, `raw/indices.rs`): read fixed-width POD first, build varint and
//! tagged forms on top of that primitive.

use crate::error::{Error, Result};

pub struct Reader<'a> {
	data: &'a [u8],
	cursor: usize,
}

macro_rules! read_le {
	($name:ident, $ty:ty) => {
		#[inline]
		pub fn $name(&mut self) -> Result<$ty> {
			const N: usize = std::mem::size_of::<$ty>();
			self.check_bound(N)?;
			let mut bytes = [0u8; N];
			bytes.copy_from_slice(&self.data[self.cursor..self.cursor + N]);
			self.cursor += N;
			Ok(<$ty>::from_le_bytes(bytes))
		}
	};
}

impl<'a> Reader<'a> {
	#[inline]
	pub fn new(data: &'a [u8]) -> Self {
		Reader { data, cursor: 0 }
	}

	#[inline]
	pub fn cursor(&self) -> usize {
		self.cursor
	}

	#[inline]
	pub fn remaining(&self) -> usize {
		self.data.len() - self.cursor
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.data.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	#[inline]
	pub fn set_cursor(&mut self, pos: usize) {
		self.cursor = pos;
	}

	/// Rewinds the cursor by `n` bytes. Used by the tagged-int forms to re-read a
	/// just-consumed prefix as a wider fixed value.
	#[inline]
	pub fn move_back(&mut self, n: usize) {
		self.cursor -= n;
	}

	#[inline]
	pub fn check_bound(&self, need: usize) -> Result<()> {
		if self.cursor + need > self.data.len() {
			return Err(Error::OutOfBounds {
				cursor: self.cursor,
				need,
				length: self.data.len(),
			});
		}
		Ok(())
	}

	#[inline]
	pub fn skip(&mut self, n: usize) -> Result<()> {
		self.check_bound(n)?;
		self.cursor += n;
		Ok(())
	}

	/// Borrows `n` bytes without copying; lifetime tied to the underlying buffer,
	/// not to this reader's own borrow.
	pub fn read_span(&mut self, n: usize) -> Result<&'a [u8]> {
		self.check_bound(n)?;
		let start = self.cursor;
		self.cursor += n;
		Ok(&self.data[start..start + n])
	}

	pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
		Ok(self.read_span(n)?.to_vec())
	}

	#[inline]
	pub fn read_u8(&mut self) -> Result<u8> {
		self.check_bound(1)?;
		let b = self.data[self.cursor];
		self.cursor += 1;
		Ok(b)
	}

	#[inline]
	pub fn read_i8(&mut self) -> Result<i8> {
		Ok(self.read_u8()? as i8)
	}

	read_le!(read_u16, u16);
	read_le!(read_i16, i16);
	read_le!(read_u32, u32);
	read_le!(read_i32, i32);
	read_le!(read_u64, u64);
	read_le!(read_i64, i64);
	read_le!(read_f32, f32);
	read_le!(read_f64, f64);

	/// Standard LEB128, ≤5 bytes.
	pub fn read_var_uint32(&mut self) -> Result<u32> {
		let mut result: u32 = 0;
		for i in 0..5 {
			let b = self.read_u8()?;
			if i == 4 {
				// 5th byte of a u32 has at most 4 payload bits.
				result |= (b as u32) << (7 * i);
				return Ok(result);
			}
			result |= ((b & 0x7f) as u32) << (7 * i);
			if b & 0x80 == 0 {
				return Ok(result);
			}
		}
		unreachable!()
	}

	/// LEB128 with a 9-byte cap: 8 continuation groups, then one raw byte carrying
	/// the top 8 bits with no continuation test (spec §4.1).
	pub fn read_var_uint64(&mut self) -> Result<u64> {
		let mut result: u64 = 0;
		for i in 0..8 {
			let b = self.read_u8()?;
			result |= ((b & 0x7f) as u64) << (7 * i);
			if b & 0x80 == 0 {
				return Ok(result);
			}
		}
		let b = self.read_u8()?;
		result |= (b as u64) << 56;
		Ok(result)
	}

	#[inline]
	pub fn read_var_int32(&mut self) -> Result<i32> {
		let u = self.read_var_uint32()?;
		Ok(((u >> 1) as i32) ^ -((u & 1) as i32))
	}

	#[inline]
	pub fn read_var_int64(&mut self) -> Result<i64> {
		let u = self.read_var_uint64()?;
		Ok(((u >> 1) as i64) ^ -((u & 1) as i64))
	}

	/// `varuint64` with an overflow check rejecting values ≥ 2^36 (spec §4.1).
	pub fn read_var_uint36_small(&mut self) -> Result<u64> {
		let value = self.read_var_uint64()?;
		if value >= (1u64 << 36) {
			return Err(Error::encoding_error(
				"varuint36small value exceeds 36 bits",
			));
		}
		Ok(value)
	}

	/// Reads the 4-byte small form, or rewinds and reads the 9-byte full form,
	/// based on the low bit of the first word (spec §4.1).
	pub fn read_tagged_int64(&mut self) -> Result<i64> {
		let word = self.read_u32()?;
		if word & 1 == 0 {
			Ok((word as i32 >> 1) as i64)
		} else {
			self.move_back(3);
			self.read_i64()
		}
	}

	pub fn read_tagged_uint64(&mut self) -> Result<u64> {
		let word = self.read_u32()?;
		if word & 1 == 0 {
			Ok((word >> 1) as u64)
		} else {
			self.move_back(3);
			self.read_u64()
		}
	}
}
