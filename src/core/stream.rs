//! Stream construction and lifecycle (spec §4.5, §6): validates the
//! object list, queries sizes, spins up the prefetcher and evictor, and
//! owns the single `Reader` handed back to the caller.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use rpf_client::{split_path, ObjectId, ObjectStoreClient};
use rpf_store::{BlockStore, Tier};
use rpf_util::background::BackgroundRunner;
use rpf_util::error::Error;
use tokio::sync::watch;

use crate::evictor::Evictor;
use crate::prefetcher::Prefetcher;
use crate::reader::{Reader, Whence};
use crate::shared::{Shared, SourceObject, StreamOptions};

/// One staging tier as passed to `open()`: a directory plus a byte
/// budget, `0` meaning "use live free space" (spec §3).
pub struct TierSpec {
	pub directory: PathBuf,
	pub budget_bytes: u64,
}

pub struct Stream {
	shared: Arc<Shared>,
	stop_tx: watch::Sender<bool>,
	workers_done: tokio::task::JoinHandle<()>,
	reader: Reader,
	closed: bool,
}

impl Stream {
	/// Open a stream over `paths` (each `"bucket/key"`, optionally
	/// `?versionId=...`), in concatenation order. Fails if `paths` is
	/// empty or any object's size cannot be determined (spec §4.5,
	/// construction is the one place size queries are fatal).
	pub async fn open(
		client: Arc<dyn ObjectStoreClient>,
		paths: &[String],
		tiers: Vec<TierSpec>,
		options: StreamOptions,
	) -> Result<Self, Error> {
		if paths.is_empty() {
			return Err(Error::Config("stream requires at least one object path".into()));
		}
		if tiers.is_empty() {
			return Err(Error::Config("stream requires at least one storage tier".into()));
		}

		let mut objects = Vec::with_capacity(paths.len());
		for path in paths {
			let (bucket, key, version) =
				split_path(path).map_err(|e| Error::Config(format!("{}: {}", path, e)))?;
			let id = ObjectId {
				bucket: bucket.clone(),
				key: key.clone(),
				version: version.clone(),
			};
			let size = client.size(&id).await.map_err(Error::from)?;
			objects.push(SourceObject {
				bucket,
				key,
				version,
				size,
			});
		}

		let tiers = tiers
			.into_iter()
			.map(|t| Tier::new(t.directory, t.budget_bytes))
			.collect();
		let store = BlockStore::new(tiers);

		let shared = Arc::new(Shared::new(objects, options, store, client));

		let (stop_tx, stop_rx) = watch::channel(false);
		let (runner, workers_done) = BackgroundRunner::new(stop_rx);
		runner.spawn_worker(Prefetcher::new(shared.clone()));
		runner.spawn_worker(Evictor::new(shared.clone()));

		let reader = Reader::new(shared.clone());

		Ok(Self {
			shared,
			stop_tx,
			workers_done,
			reader,
			closed: false,
		})
	}

	pub fn len(&self) -> u64 {
		self.shared.logical_size()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn position(&self) -> u64 {
		self.reader.position()
	}

	pub async fn read(&mut self, n: i64) -> Result<Bytes, Error> {
		self.reader.read(n).await
	}

	pub async fn seek(&mut self, pos: i64, whence: Whence) -> Result<u64, Error> {
		self.reader.seek(pos, whence).await
	}

	/// Stop the prefetcher and evictor, let the evictor run its final
	/// sweep, and close the reader's open block. Idempotent.
	pub async fn close(&mut self) {
		if self.closed {
			return;
		}
		self.closed = true;
		let _ = self.stop_tx.send(true);
		self.shared.block_ready.notify_waiters();
		// `workers_done` already bounds its own wait (background::worker's
		// 5s/9s grace periods); nothing further to time out here.
		let _ = (&mut self.workers_done).await;
		self.reader.close().await;
	}
}

impl Drop for Stream {
	fn drop(&mut self) {
		if !self.closed {
			let _ = self.stop_tx.send(true);
			self.shared.block_ready.notify_waiters();
		}
	}
}
