use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

/// A `(directory, byte-budget)` staging location (spec §3). `budget == 0`
/// means "use the tier's current free space". `accounted_used` is written
/// by the prefetcher (debited on every committed block) and by the
/// evictor (credited on every reclaimed block) — the single-writer-per-
/// counter discipline documented in SPEC_FULL.md's resolved open question.
pub struct Tier {
	pub directory: PathBuf,
	pub budget: u64,
	accounted_used: AtomicU64,
}

impl Tier {
	pub fn new(directory: PathBuf, budget: u64) -> Self {
		Self {
			directory,
			budget,
			accounted_used: AtomicU64::new(0),
		}
	}

	pub fn used(&self) -> u64 {
		self.accounted_used.load(Ordering::Relaxed)
	}

	pub fn debit(&self, amount: u64) {
		self.accounted_used.fetch_add(amount, Ordering::Relaxed);
	}

	pub(crate) fn credit(&self, amount: u64) {
		// Saturating: a tier that is also reclaimed by some other path
		// (e.g. stream shutdown cleanup) must never wrap around to u64::MAX.
		let mut cur = self.accounted_used.load(Ordering::Relaxed);
		loop {
			let next = cur.saturating_sub(amount);
			match self.accounted_used.compare_exchange_weak(
				cur,
				next,
				Ordering::Relaxed,
				Ordering::Relaxed,
			) {
				Ok(_) => break,
				Err(observed) => cur = observed,
			}
		}
	}

	pub fn free_budget(&self) -> u64 {
		if self.budget == 0 {
			match fs2::available_space(&self.directory) {
				Ok(free) => free,
				Err(e) => {
					warn!(
						"free_budget: could not stat free space for {}: {}",
						self.directory.display(),
						e
					);
					0
				}
			}
		} else {
			self.budget.saturating_sub(self.used())
		}
	}
}
