//! State shared between the prefetcher, the evictor and every `Reader`
//! handle of a single open stream (spec §3 "Logical stream", §4).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rpf_client::{ObjectId, ObjectStoreClient};
use rpf_store::{flatten_key, BlockStore, DELETED_SUFFIX};
use tokio::sync::Notify;

use crate::metrics::StreamMetrics;
use crate::progress::PrefetchProgress;

/// One object making up the logical stream, in read order.
#[derive(Debug, Clone)]
pub struct SourceObject {
	pub bucket: String,
	pub key: String,
	pub version: Option<String>,
	/// Total size of the object, queried at construction time.
	pub size: u64,
}

impl SourceObject {
	pub fn object_id(&self) -> ObjectId {
		ObjectId {
			bucket: self.bucket.clone(),
			key: self.key.clone(),
			version: self.version.clone(),
		}
	}

	/// Bytes this object contributes to the logical stream: the whole
	/// object for the first one, the object minus the header for every
	/// subsequent one (spec §3 concatenation rule).
	pub fn logical_contribution(&self, is_first: bool, header_bytes: u64) -> u64 {
		if is_first {
			self.size
		} else {
			self.size.saturating_sub(header_bytes)
		}
	}
}

/// Tuning knobs for a single `open()` call (spec §6).
#[derive(Debug, Clone)]
pub struct StreamOptions {
	pub block_size: u64,
	pub header_bytes: u64,
	pub block_wait_poll: Duration,
	pub block_wait_timeout: Option<Duration>,
	pub eviction_interval: Duration,
}

impl Default for StreamOptions {
	fn default() -> Self {
		Self {
			block_size: 32 * 1024 * 1024,
			header_bytes: 0,
			block_wait_poll: Duration::from_millis(100),
			block_wait_timeout: None,
			eviction_interval: Duration::from_secs(5),
		}
	}
}

/// Everything the prefetcher, evictor and reader(s) of one stream share.
/// Construction computes the cumulative logical-offset table once so every
/// `locate` call is a binary search, not a scan.
pub struct Shared {
	pub objects: Vec<SourceObject>,
	pub options: StreamOptions,
	pub store: BlockStore,
	pub client: Arc<dyn ObjectStoreClient>,
	pub metrics: StreamMetrics,
	pub progress: PrefetchProgress,
	/// Cumulative logical bytes contributed by objects `[0, i)`; length is
	/// `objects.len() + 1`, last entry is the total logical size.
	cumulative: Vec<u64>,
	/// The enumerable set of `<key>.<block-offset><DELETED_SUFFIX>` names
	/// this stream could ever produce, derived once from the file list and
	/// block tiling (spec §4.3: the evictor's sweep must not touch a stray
	/// file in the tier that merely happens to share the delete suffix).
	pub known_deleted_names: HashSet<String>,
	/// Woken whenever the prefetcher commits a block or the stream is
	/// closed, so a waiting reader doesn't have to poll on a tight timer.
	pub block_ready: Notify,
	/// Woken by the prefetcher whenever every tier came up short on
	/// budget, so the evictor's next sweep happens immediately rather
	/// than waiting out its timer (spec §4.3 reconciliation; mirrors the
	/// original's eviction-inline-with-a-full-loop coupling, see
	/// SPEC_FULL.md "Supplemented features").
	pub evict_now: Notify,
}

impl Shared {
	pub fn new(
		objects: Vec<SourceObject>,
		options: StreamOptions,
		store: BlockStore,
		client: Arc<dyn ObjectStoreClient>,
	) -> Self {
		let mut cumulative = Vec::with_capacity(objects.len() + 1);
		cumulative.push(0);
		let mut total = 0u64;
		for (i, object) in objects.iter().enumerate() {
			total += object.logical_contribution(i == 0, options.header_bytes);
			cumulative.push(total);
		}

		let known_deleted_names = known_deleted_names(&objects, options.block_size);

		Self {
			objects,
			options,
			store,
			client,
			metrics: StreamMetrics::new(),
			progress: PrefetchProgress::new(),
			cumulative,
			known_deleted_names,
			block_ready: Notify::new(),
			evict_now: Notify::new(),
		}
	}

	pub fn logical_size(&self) -> u64 {
		*self.cumulative.last().unwrap_or(&0)
	}

	/// Map a logical stream position to `(object_index, offset_in_object)`.
	/// `logical_pos` must be `< logical_size()`.
	pub fn locate(&self, logical_pos: u64) -> (usize, u64) {
		// Largest `i` with cumulative[i] <= logical_pos.
		let i = match self.cumulative.binary_search(&logical_pos) {
			Ok(i) => i,
			Err(i) => i - 1,
		};
		let i = i.min(self.objects.len() - 1);
		let offset_in_object = if i == 0 {
			logical_pos
		} else {
			self.options.header_bytes + (logical_pos - self.cumulative[i])
		};
		(i, offset_in_object)
	}

	pub fn block_size(&self) -> u64 {
		self.options.block_size
	}

	/// Start offset of the block covering `offset_in_object`.
	pub fn block_start(&self, offset_in_object: u64) -> u64 {
		(offset_in_object / self.block_size()) * self.block_size()
	}
}

/// Every `<key>.<block-offset><DELETED_SUFFIX>` name this stream's file
/// list and tiling could produce (spec §3 "Block": `[j*B, min((j+1)*B,
/// size))` for `j = 0 .. ceil(size/B) - 1`).
fn known_deleted_names(objects: &[SourceObject], block_size: u64) -> HashSet<String> {
	let mut names = HashSet::new();
	for object in objects {
		let flat = flatten_key(&object.key);
		let mut offset = 0u64;
		while offset < object.size {
			names.insert(format!("{}.{}{}", flat, offset, DELETED_SUFFIX));
			offset += block_size;
		}
	}
	names
}
