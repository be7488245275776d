//! Scoped call state threaded through a single serialize/deserialize call
//! (spec §3 "WriteContext / ReadContext", §4.12).

use crate::buffer::{Reader, Writer};
use crate::error::{Error, Result};
use crate::reference::{RefReader, RefWriter};

#[derive(Debug, Default)]
struct DepthGuard {
	max_depth: i32,
	depth: i32,
}

impl DepthGuard {
	fn enter(&mut self) -> Result<()> {
		self.depth += 1;
		if self.depth > self.max_depth {
			return Err(Error::invalid_data("recursion depth exceeded"));
		}
		Ok(())
	}

	fn exit(&mut self) {
		self.depth -= 1;
	}
}

/// State carried through a single top-level `serialize` call (spec §4.4, §4.12).
#[derive(Debug)]
pub struct WriteContext {
	pub writer: Writer,
	pub ref_writer: RefWriter,
	pub track_ref: bool,
	pub compatible: bool,
	depth_guard: DepthGuard,
}

impl WriteContext {
	pub fn new(track_ref: bool, compatible: bool, max_depth: i32) -> Self {
		WriteContext {
			writer: Writer::new(),
			ref_writer: RefWriter::new(),
			track_ref,
			compatible,
			depth_guard: DepthGuard { max_depth, depth: 0 },
		}
	}

	pub fn enter_nested(&mut self) -> Result<()> {
		self.depth_guard.enter()
	}

	pub fn exit_nested(&mut self) {
		self.depth_guard.exit()
	}

	pub fn reset(&mut self) {
		self.writer.reset();
		self.ref_writer.reset();
		self.depth_guard.depth = 0;
	}
}

/// State carried through a single top-level `deserialize` call. Generic over
/// `V`, the host value representation the ref table stores identities of
/// (spec §4.4, §4.12).
pub struct ReadContext<'a, V> {
	pub reader: Reader<'a>,
	pub ref_reader: RefReader<V>,
	pub track_ref: bool,
	pub compatible: bool,
	depth_guard: DepthGuard,
}

impl<'a, V: Clone> ReadContext<'a, V> {
	pub fn new(reader: Reader<'a>, track_ref: bool, compatible: bool, max_depth: i32) -> Self {
		ReadContext {
			reader,
			ref_reader: RefReader::new(),
			track_ref,
			compatible,
			depth_guard: DepthGuard { max_depth, depth: 0 },
		}
	}

	pub fn enter_nested(&mut self) -> Result<()> {
		self.depth_guard.enter()
	}

	pub fn exit_nested(&mut self) {
		self.depth_guard.exit()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn depth_guard_rejects_past_max_depth() {
		let mut ctx = WriteContext::new(false, false, 2);
		ctx.enter_nested().unwrap();
		ctx.enter_nested().unwrap();
		assert!(ctx.enter_nested().is_err());
	}

}
