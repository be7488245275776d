//! Reference tracker: identity-preserving back-reference protocol (spec §4.4).

use crate::error::{Error, Result};
use crate::types::RefFlag;
use fxhash::FxHashMap;

/// Write-side ref tracker. Keyed by reference identity (a pointer-sized key
/// the caller derives, e.g. `Rc::as_ptr` or a slot index), not by value.
#[derive(Debug, Default)]
pub struct RefWriter {
	seen: FxHashMap<usize, u32>,
	next_id: u32,
}

impl RefWriter {
	pub fn new() -> Self {
		RefWriter::default()
	}

	/// Looks up `identity`: if already seen, returns `Some(refId)` for the
	/// caller to emit as `RefFlag::Ref`; otherwise records it under a fresh id
	/// and returns `None` (the caller emits `RefFlag::RefValue` and proceeds
	/// to serialize the payload).
	pub fn try_write_reference(&mut self, identity: usize) -> Option<u32> {
		if let Some(&id) = self.seen.get(&identity) {
			return Some(id);
		}
		let id = self.next_id;
		self.seen.insert(identity, id);
		self.next_id += 1;
		None
	}

	/// Consumes a fresh id without recording it against any identity; used by
	/// out-of-line reservations.
	pub fn reserve_ref_id(&mut self) -> u32 {
		let id = self.next_id;
		self.next_id += 1;
		id
	}

	pub fn reset(&mut self) {
		self.seen.clear();
		self.next_id = 0;
	}
}

/// Read-side ref tracker: a slot table indexed by refId, plus the pending
/// stack that makes cyclic reads possible (spec §4.4).
#[derive(Debug, Default)]
pub struct RefReader<T> {
	slots: Vec<Option<T>>,
	pending: Vec<u32>,
}

impl<T: Clone> RefReader<T> {
	pub fn new() -> Self {
		RefReader {
			slots: Vec::new(),
			pending: Vec::new(),
		}
	}

	/// Pushes a null slot and returns its index, then marks it pending.
	pub fn reserve_ref_id(&mut self) -> u32 {
		let id = self.slots.len() as u32;
		self.slots.push(None);
		self.pending.push(id);
		id
	}

	/// Fills a previously reserved slot and pops it off the pending stack.
	/// Called as soon as the value's identity is stable — before recursing
	/// into a container's children, so cyclic back-references resolve.
	pub fn finish_pending_reference_if_needed(&mut self, value: T) -> Result<()> {
		let id = self
			.pending
			.pop()
			.ok_or_else(|| Error::ref_error("no pending reference to finish"))?;
		self.slots[id as usize] = Some(value);
		Ok(())
	}

	pub fn store_ref(&mut self, id: u32, value: T) {
		if id as usize >= self.slots.len() {
			self.slots.resize(id as usize + 1, None);
		}
		self.slots[id as usize] = Some(value);
	}

	/// Returns the slot's value. `None` if the slot is in-flight for a cyclic
	/// read still being constructed.
	pub fn read_ref_value(&self, id: u32) -> Result<Option<T>> {
		self.slots
			.get(id as usize)
			.cloned()
			.ok_or_else(|| Error::ref_error("refId out of range"))
	}

	pub fn reset(&mut self) {
		self.slots.clear();
		self.pending.clear();
	}
}

/// Interns identical byte ranges on a non-tracking read, deduplicating without
/// the full ref protocol. Purely an optimization: the only observable effect
/// is increased sharing on the read side (spec §4.4).
#[derive(Debug, Default)]
pub struct NonTrackingCanonicalizer<T> {
	by_bytes: FxHashMap<Vec<u8>, T>,
}

impl<T: Clone> NonTrackingCanonicalizer<T> {
	pub fn new() -> Self {
		NonTrackingCanonicalizer {
			by_bytes: FxHashMap::default(),
		}
	}

	pub fn canonicalize_non_tracking_reference(&mut self, bytes: &[u8], value: T) -> T {
		if let Some(existing) = self.by_bytes.get(bytes) {
			return existing.clone();
		}
		self.by_bytes.insert(bytes.to_vec(), value.clone());
		value
	}
}

/// Wire tag written ahead of a ref-tracked field's payload.
pub fn ref_flag_for_write(seen: Option<u32>) -> RefFlag {
	match seen {
		Some(_) => RefFlag::Ref,
		None => RefFlag::RefValue,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn write_side_assigns_ids_in_first_encounter_order() {
		let mut w = RefWriter::new();
		assert_eq!(w.try_write_reference(0xAAA), None);
		assert_eq!(w.try_write_reference(0xBBB), None);
		assert_eq!(w.try_write_reference(0xAAA), Some(0));
		assert_eq!(w.try_write_reference(0xBBB), Some(1));
	}

	#[test]
	fn read_side_resolves_cycle_via_pending_slot() {
		let mut r: RefReader<i32> = RefReader::new();
		let id = r.reserve_ref_id();
		// Simulate resolving a self-reference before the value is complete.
		assert_eq!(r.read_ref_value(id).unwrap(), None);
		r.finish_pending_reference_if_needed(42).unwrap();
		assert_eq!(r.read_ref_value(id).unwrap(), Some(42));
	}

	#[test]
	fn reset_clears_both_tables() {
		let mut w = RefWriter::new();
		w.try_write_reference(1);
		w.reset();
		assert_eq!(w.try_write_reference(1), None);
	}
}
