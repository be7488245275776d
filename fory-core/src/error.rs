//! The sum-type error returned by every fallible read/write operation (spec §6.6).
//!
//! Mirrors the shape of the teacher's `schema::errors::ReadError`, but derived with
//! `thiserror` since these variants carry structured fields the teacher's plain
//! `From<std::io::Error>` wrapper doesn't need.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid data: {0}")]
	InvalidData(String),

	#[error("type mismatch: expected {expected}, got {actual}")]
	TypeMismatch { expected: u32, actual: u32 },

	#[error("type not registered: {0}")]
	TypeNotRegistered(String),

	#[error("reference error: {0}")]
	RefError(String),

	#[error("encoding error: {0}")]
	EncodingError(String),

	#[error("out of bounds: cursor={cursor}, need={need}, length={length}")]
	OutOfBounds {
		cursor: usize,
		need: usize,
		length: usize,
	},
}

impl Error {
	#[inline]
	pub fn invalid_data(msg: impl Into<String>) -> Self {
		Error::InvalidData(msg.into())
	}

	#[inline]
	pub fn type_not_registered(what: impl Into<String>) -> Self {
		Error::TypeNotRegistered(what.into())
	}

	#[inline]
	pub fn ref_error(msg: impl Into<String>) -> Self {
		Error::RefError(msg.into())
	}

	#[inline]
	pub fn encoding_error(msg: impl Into<String>) -> Self {
		Error::EncodingError(msg.into())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
