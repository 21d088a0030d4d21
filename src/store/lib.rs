//! Tiered local block store (spec §3, §4.1).
//!
//! Pure local filesystem abstraction: persists and looks up staged block
//! payloads by `(key, block-offset)` across ordered storage directories,
//! each with its own byte budget. Every operation that fails logs and
//! returns a neutral value — failures here are never fatal to the
//! prefetcher or evictor (spec §4.1, §7).

mod key;
mod tier;
mod writer;

pub use key::flatten_key;
pub use tier::Tier;
pub use writer::BlockWriter;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Suffix appended to a ready block's filename once the reader has
/// exhausted it, signalling the evictor to unlink it (spec §3, §6).
pub const DELETED_SUFFIX: &str = ".nibtodelete";

/// Ordered set of staging tiers, tried in list order for placement
/// (spec §3 "Storage tier").
pub struct BlockStore {
	tiers: Vec<Tier>,
}

impl BlockStore {
	pub fn new(tiers: Vec<Tier>) -> Self {
		Self { tiers }
	}

	pub fn tiers(&self) -> &[Tier] {
		&self.tiers
	}

	pub fn tier(&self, index: usize) -> &Tier {
		&self.tiers[index]
	}

	/// Create a hidden temporary name in `tier.dir` and return a sink
	/// that, on successful `commit`, atomically renames it to the
	/// canonical `<key>.<off>` (spec §4.1 `place_inflight`).
	pub async fn place_inflight(
		&self,
		tier_index: usize,
		key: &str,
		offset: u64,
	) -> std::io::Result<BlockWriter> {
		let tier = &self.tiers[tier_index];
		BlockWriter::create(tier.directory.clone(), tier_index, key, offset).await
	}

	/// Search tiers in order for a ready `(key, off)` block. An in-flight
	/// sibling (the `.tmp` name) does not count as found — it is "not
	/// yet ready" (spec §4.1 `lookup`).
	pub fn lookup(&self, key: &str, offset: u64) -> Option<(PathBuf, usize)> {
		let flat = flatten_key(key);
		for (idx, tier) in self.tiers.iter().enumerate() {
			let path = tier.directory.join(format!("{}.{}", flat, offset));
			if path.is_file() {
				return Some((path, idx));
			}
		}
		None
	}

	/// Atomically rename a ready block to its consumed (pending-eviction)
	/// name (spec §4.1 `mark_consumed`). Non-fatal on failure: logs and
	/// returns the original path unchanged semantics are left to the
	/// caller, which should simply stop using the handle either way.
	pub async fn mark_consumed(&self, path: &Path) -> std::io::Result<PathBuf> {
		let mut deleted = path.as_os_str().to_owned();
		deleted.push(DELETED_SUFFIX);
		let deleted = PathBuf::from(deleted);
		tokio::fs::rename(path, &deleted).await?;
		Ok(deleted)
	}

	/// Unlink every file in `tier` whose name both ends with
	/// [`DELETED_SUFFIX`] and appears in `known_deleted_names` — the
	/// enumerable set of `<key>.<block-offset>` names derived from this
	/// stream's file list and block tiling. Names outside that set are
	/// left untouched even if they carry the delete suffix, so a stray
	/// file dropped in the tier by something else is never unlinked
	/// (spec §4.3). Returns `(files reclaimed, bytes reclaimed)`; failures
	/// to unlink an individual file (already gone, permission issue) are
	/// tolerated and logged (spec §4.1 `reclaim_consumed`, §7).
	pub async fn reclaim_consumed(
		&self,
		tier_index: usize,
		known_deleted_names: &HashSet<String>,
	) -> (usize, u64) {
		let tier = &self.tiers[tier_index];
		let mut reclaimed = 0;
		let mut bytes_reclaimed: u64 = 0;

		let mut read_dir = match tokio::fs::read_dir(&tier.directory).await {
			Ok(rd) => rd,
			Err(e) => {
				warn!(
					"reclaim_consumed: could not read tier dir {}: {}",
					tier.directory.display(),
					e
				);
				return (0, 0);
			}
		};

		loop {
			let entry = match read_dir.next_entry().await {
				Ok(Some(e)) => e,
				Ok(None) => break,
				Err(e) => {
					warn!("reclaim_consumed: error walking directory: {}", e);
					break;
				}
			};
			let name = entry.file_name();
			let name = match name.to_str() {
				Some(n) => n,
				None => continue,
			};
			if !name.ends_with(DELETED_SUFFIX) || !known_deleted_names.contains(name) {
				continue;
			}
			let path = entry.path();
			let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
			match tokio::fs::remove_file(&path).await {
				Ok(()) => {
					reclaimed += 1;
					bytes_reclaimed += size;
				}
				Err(e) => {
					debug!("reclaim_consumed: unlink {} failed: {}", path.display(), e);
				}
			}
		}

		if bytes_reclaimed > 0 {
			tier.credit(bytes_reclaimed);
		}

		(reclaimed, bytes_reclaimed)
	}

	/// Current free budget for a tier: live filesystem free space if the
	/// tier's configured budget is `0`, otherwise `budget -
	/// accounted_used` (spec §4.1 `free_budget`).
	pub fn free_budget(&self, tier_index: usize) -> u64 {
		self.tiers[tier_index].free_budget()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	async fn write_block(store: &BlockStore, tier: usize, key: &str, offset: u64, data: &[u8]) -> PathBuf {
		let mut w = store.place_inflight(tier, key, offset).await.unwrap();
		w.write_all(data).await.unwrap();
		w.commit().await.unwrap()
	}

	#[tokio::test]
	async fn place_then_lookup() {
		let dir = mktemp::Temp::new_dir().unwrap();
		let store = BlockStore::new(vec![Tier::new(dir.to_path_buf(), 0)]);

		assert!(store.lookup("obj", 0).is_none());
		write_block(&store, 0, "obj", 0, b"hello world").await;

		let (path, tier_idx) = store.lookup("obj", 0).unwrap();
		assert_eq!(tier_idx, 0);
		assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello world");
	}

	#[tokio::test]
	async fn in_flight_block_is_not_visible() {
		let dir = mktemp::Temp::new_dir().unwrap();
		let store = BlockStore::new(vec![Tier::new(dir.to_path_buf(), 0)]);

		let mut w = store.place_inflight(0, "obj", 0).await.unwrap();
		w.write_all(b"partial").await.unwrap();

		// Not committed yet: must not be visible to lookup.
		assert!(store.lookup("obj", 0).is_none());

		w.commit().await.unwrap();
		assert!(store.lookup("obj", 0).is_some());
	}

	#[tokio::test]
	async fn mark_consumed_then_reclaim() {
		let dir = mktemp::Temp::new_dir().unwrap();
		let store = BlockStore::new(vec![Tier::new(dir.to_path_buf(), 1024)]);

		store.tier(0).debit(11);
		let path = write_block(&store, 0, "obj", 0, b"hello world").await;
		assert_eq!(store.free_budget(0), 1024 - 11);

		let deleted_path = store.mark_consumed(&path).await.unwrap();
		assert!(deleted_path.to_string_lossy().ends_with(DELETED_SUFFIX));
		assert!(store.lookup("obj", 0).is_none());

		let known: HashSet<String> = [format!("obj.0{}", DELETED_SUFFIX)].into_iter().collect();
		let (reclaimed, reclaimed_bytes) = store.reclaim_consumed(0, &known).await;
		assert_eq!(reclaimed, 1);
		assert_eq!(reclaimed_bytes, 11);
		assert!(!deleted_path.exists());
		assert_eq!(store.free_budget(0), 1024);
	}

	#[tokio::test]
	async fn reclaim_consumed_ignores_names_outside_the_known_set() {
		let dir = mktemp::Temp::new_dir().unwrap();
		let store = BlockStore::new(vec![Tier::new(dir.to_path_buf(), 1024)]);

		let path = write_block(&store, 0, "obj", 0, b"hello world").await;
		let deleted_path = store.mark_consumed(&path).await.unwrap();

		// A stray file with the delete suffix but not part of this
		// stream's known name set must survive the sweep untouched.
		let known: HashSet<String> = HashSet::new();
		let (reclaimed, reclaimed_bytes) = store.reclaim_consumed(0, &known).await;
		assert_eq!(reclaimed, 0);
		assert_eq!(reclaimed_bytes, 0);
		assert!(deleted_path.exists());
	}

	#[tokio::test]
	async fn keys_with_slashes_are_flattened_consistently() {
		let dir = mktemp::Temp::new_dir().unwrap();
		let store = BlockStore::new(vec![Tier::new(dir.to_path_buf(), 0)]);

		write_block(&store, 0, "shard/one.bin", 0, b"xyz").await;
		assert!(store.lookup("shard/one.bin", 0).is_some());
	}
}
