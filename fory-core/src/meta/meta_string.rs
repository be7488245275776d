//! Minimal MetaString name oracle.
//!
//! The real Fory MetaString algorithm bit-packs restricted alphabets (lower,
//! lower+upper+digit, …) down to 5/6 bits per character; that compaction is an
//! external collaborator out of scope here. This oracle keeps the encoding
//! *selection* logic (so `TypeMetaFieldInfo` round-trips the encoding code a
//! real implementation would choose) but stores the payload as plain UTF-8
//! bytes regardless of which of the three codes is picked.

use crate::error::{Error, Result};
use crate::types::MetaStringEncoding;

/// Picks the encoding a real oracle would use for `s`, based on its alphabet.
pub fn choose_encoding(s: &str) -> MetaStringEncoding {
	if s.bytes().all(|b| matches!(b, b'a'..=b'z' | b'.' | b'_' | b'$')) {
		MetaStringEncoding::AllToLowerSpecial
	} else if s
		.bytes()
		.all(|b| matches!(b, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_'))
	{
		MetaStringEncoding::LowerUpperDigitSpecial
	} else {
		MetaStringEncoding::Utf8
	}
}

pub fn encode(s: &str, _encoding: MetaStringEncoding) -> Vec<u8> {
	s.as_bytes().to_vec()
}

pub fn decode(bytes: &[u8], _encoding: MetaStringEncoding) -> Result<String> {
	String::from_utf8(bytes.to_vec()).map_err(|_| Error::invalid_data("invalid utf-8 in MetaString"))
}
