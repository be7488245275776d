//! Leaf codecs for primitive and temporal `TypeId`s (spec §4.2).
//!
//! Integers beyond the 8/16-bit widths are just `Reader`/`Writer` fixed or
//! varint calls and don't need a wrapper here; this module covers the leaf
//! kinds with their own header or normalization rules: `String`, `Binary`,
//! `Date`, `Timestamp`, `Duration`.

use crate::buffer::{Reader, Writer};
use crate::error::{Error, Result};
use crate::types::StringEncoding;

#[inline]
pub fn write_bool(writer: &mut Writer, value: bool) {
	writer.write_u8(value as u8);
}

#[inline]
pub fn read_bool(reader: &mut Reader) -> Result<bool> {
	Ok(reader.read_u8()? != 0)
}

/// Writes the packed `(byteLen << 2) | encoding` header via `varuint36small`,
/// then the raw bytes. Always encodes as UTF-8 (spec §4.2: "default to Utf8 on
/// write").
pub fn write_string(writer: &mut Writer, value: &str) -> Result<()> {
	let header = ((value.len() as u64) << 2) | (StringEncoding::Utf8 as u64);
	writer.write_var_uint36_small(header)?;
	writer.write_bytes(value.as_bytes());
	Ok(())
}

pub fn read_string(reader: &mut Reader) -> Result<String> {
	let header = reader.read_var_uint36_small()?;
	let encoding_code = (header & 0x3) as u8;
	let byte_len = (header >> 2) as usize;
	let encoding = StringEncoding::from_repr(encoding_code)
		.ok_or_else(|| Error::encoding_error("unknown String encoding code"))?;
	let bytes = reader.read_bytes(byte_len)?;
	match encoding {
		StringEncoding::Utf8 => {
			String::from_utf8(bytes).map_err(|_| Error::invalid_data("invalid utf-8 in String"))
		}
		StringEncoding::Latin1 => Ok(bytes.into_iter().map(|b| b as char).collect()),
		StringEncoding::Utf16 => {
			if bytes.len() % 2 != 0 {
				return Err(Error::invalid_data("odd byte length for utf-16 String"));
			}
			let units: Vec<u16> = bytes
				.chunks_exact(2)
				.map(|c| u16::from_le_bytes([c[0], c[1]]))
				.collect();
			String::from_utf16(&units).map_err(|_| Error::invalid_data("invalid utf-16 in String"))
		}
	}
}

pub fn write_binary(writer: &mut Writer, value: &[u8]) {
	writer.write_var_uint32(value.len() as u32);
	writer.write_bytes(value);
}

pub fn read_binary(reader: &mut Reader) -> Result<Vec<u8>> {
	let len = reader.read_var_uint32()? as usize;
	reader.read_bytes(len)
}

/// Days since 1970-01-01.
#[inline]
pub fn write_date(writer: &mut Writer, days: i32) {
	writer.write_i32(days);
}

#[inline]
pub fn read_date(reader: &mut Reader) -> Result<i32> {
	reader.read_i32()
}

const NANOS_PER_SEC: i64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
	pub seconds: i64,
	pub nanos: u32,
}

impl Timestamp {
	/// Normalizes `(seconds, nanos)` so that `0 <= nanos < 1e9`, folding any
	/// excess into `seconds` (spec §4.2).
	pub fn new(seconds: i64, nanos: i64) -> Self {
		let extra_seconds = nanos.div_euclid(NANOS_PER_SEC);
		let nanos = nanos.rem_euclid(NANOS_PER_SEC) as u32;
		Timestamp {
			seconds: seconds + extra_seconds,
			nanos,
		}
	}
}

pub fn write_timestamp(writer: &mut Writer, value: Timestamp) {
	writer.write_i64(value.seconds);
	writer.write_u32(value.nanos);
}

pub fn read_timestamp(reader: &mut Reader) -> Result<Timestamp> {
	let seconds = reader.read_i64()?;
	let nanos = reader.read_u32()?;
	Ok(Timestamp { seconds, nanos })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
	pub seconds: i64,
	pub nanos: i32,
}

impl Duration {
	/// Builds a `Duration` from a tick count where 1 tick = 100 ns (spec §4.2).
	pub fn from_ticks(ticks: i64) -> Self {
		let total_nanos = ticks as i128 * 100;
		let seconds = total_nanos.div_euclid(NANOS_PER_SEC as i128) as i64;
		let nanos = total_nanos.rem_euclid(NANOS_PER_SEC as i128) as i32;
		Duration { seconds, nanos }
	}
}

pub fn write_duration(writer: &mut Writer, value: Duration) {
	writer.write_i64(value.seconds);
	writer.write_i32(value.nanos);
}

pub fn read_duration(reader: &mut Reader) -> Result<Duration> {
	let seconds = reader.read_i64()?;
	let nanos = reader.read_i32()?;
	Ok(Duration { seconds, nanos })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn string_header_matches_scenario_1() {
		let mut w = Writer::new();
		write_string(&mut w, "abc").unwrap();
		assert_eq!(w.to_vec(), vec![0x0E, 0x61, 0x62, 0x63]);
	}

	#[test]
	fn string_round_trips() {
		let mut w = Writer::new();
		write_string(&mut w, "hello fory").unwrap();
		let bytes = w.to_vec();
		let mut r = Reader::new(&bytes);
		assert_eq!(read_string(&mut r).unwrap(), "hello fory");
	}

	#[test]
	fn binary_round_trips() {
		let mut w = Writer::new();
		write_binary(&mut w, &[1, 2, 3, 4, 5]);
		let bytes = w.to_vec();
		let mut r = Reader::new(&bytes);
		assert_eq!(read_binary(&mut r).unwrap(), vec![1, 2, 3, 4, 5]);
	}

	#[test]
	fn timestamp_normalizes_negative_nanos() {
		let ts = Timestamp::new(10, -1);
		assert_eq!(ts.seconds, 9);
		assert_eq!(ts.nanos, 999_999_999);
	}

	#[test]
	fn duration_from_ticks_round_trips_via_wire() {
		let d = Duration::from_ticks(12_345_678);
		let mut w = Writer::new();
		write_duration(&mut w, d);
		let bytes = w.to_vec();
		let mut r = Reader::new(&bytes);
		assert_eq!(read_duration(&mut r).unwrap(), d);
	}
}
