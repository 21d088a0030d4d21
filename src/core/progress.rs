//! The prefetcher's current position, published for the reader to consult
//! when deciding whether a missing block is merely "not staged yet" (ahead
//! of the prefetcher, worth a bounded wait) or "already passed over and
//! reclaimed" (behind it, falls back to a direct GET — spec §9 resolved
//! open question on re-seek semantics).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub struct PrefetchProgress {
	object_index: AtomicUsize,
	offset: AtomicU64,
}

impl PrefetchProgress {
	pub fn new() -> Self {
		Self {
			object_index: AtomicUsize::new(0),
			offset: AtomicU64::new(0),
		}
	}

	pub fn set(&self, object_index: usize, offset: u64) {
		self.object_index.store(object_index, Ordering::Release);
		self.offset.store(offset, Ordering::Release);
	}

	pub fn get(&self) -> (usize, u64) {
		// Order matters only for the monotonic-enough heuristic below; a
		// torn read at worst makes the reader wait once instead of
		// falling back directly, which is always safe.
		let object_index = self.object_index.load(Ordering::Acquire);
		let offset = self.offset.load(Ordering::Acquire);
		(object_index, offset)
	}

	/// True if `(object_index, offset)` is strictly behind where the
	/// prefetcher currently stands, i.e. a block there has already been
	/// passed over (and may already be consumed/reclaimed).
	pub fn is_behind(&self, object_index: usize, offset: u64) -> bool {
		let (p_object, p_offset) = self.get();
		object_index < p_object || (object_index == p_object && offset < p_offset)
	}
}

impl Default for PrefetchProgress {
	fn default() -> Self {
		Self::new()
	}
}
