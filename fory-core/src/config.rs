//! Root configuration (spec §6.5).

use crate::error::Error;

#[derive(Debug, Clone, Copy)]
pub struct Config {
	pub xlang: bool,
	pub track_ref: bool,
	pub compatible: bool,
	pub check_struct_version: bool,
	pub enable_reflection_fallback: bool,
	pub max_depth: i32,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			xlang: true,
			track_ref: false,
			compatible: false,
			check_struct_version: false,
			enable_reflection_fallback: false,
			max_depth: 512,
		}
	}
}

impl Config {
	/// Validates the construction-time invariant `max_depth > 0` (spec §6.5).
	pub fn validate(&self) -> Result<(), Error> {
		if self.max_depth <= 0 {
			return Err(Error::invalid_data("max_depth must be > 0"));
		}
		Ok(())
	}
}
