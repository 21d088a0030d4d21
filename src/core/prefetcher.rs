//! The background worker that walks the logical stream ahead of the
//! reader, staging one block at a time into the first tier with room
//! (spec §4.2). Grounded on `garage_block::repair::ScrubWorker`'s shape:
//! a `Worker` impl whose `work()` does one step and returns `Busy` to be
//! called again, `Done` once there is nothing left to do.

use std::sync::Arc;

use async_trait::async_trait;
use rpf_client::ObjectStoreClient;
use rpf_util::background::{Worker, WorkerStatus};
use rpf_util::error::Error;
use rpf_util::metrics::RecordDuration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::shared::Shared;

/// How long the prefetcher sleeps when every tier is full before
/// re-checking (spec §4.2, "all tiers full": backpressure, not an error).
const BACKOFF: std::time::Duration = std::time::Duration::from_millis(200);

pub struct Prefetcher {
	shared: Arc<Shared>,
	object_index: usize,
	offset: u64,
	done: bool,
}

impl Prefetcher {
	pub fn new(shared: Arc<Shared>) -> Self {
		Self {
			shared,
			object_index: 0,
			offset: 0,
			done: false,
		}
	}

	fn pick_tier(&self) -> Option<usize> {
		let want = self.shared.block_size();
		(0..self.shared.store.tiers().len()).find(|&i| self.shared.store.free_budget(i) >= want)
	}

	async fn fetch_and_place(&self, tier_index: usize, start: u64, end: u64) -> Result<(), Error> {
		let object = &self.shared.objects[self.object_index];
		let data = self
			.shared
			.client
			.get_range(&object.object_id(), start, end)
			.bound_record_duration(&self.shared.metrics.fetch_duration)
			.await
			.map_err(Error::from)?;

		let mut writer = self.shared.store.place_inflight(tier_index, &object.key, start).await?;
		writer.write_all(&data).await?;
		writer.commit().await?;

		self.shared.store.tier(tier_index).debit(data.len() as u64);
		let ctx = opentelemetry::Context::current();
		self.shared.metrics.bytes_prefetched.add(&ctx, data.len() as u64, &[]);
		self.shared.metrics.blocks_written.add(&ctx, 1, &[]);
		self.shared.block_ready.notify_waiters();
		Ok(())
	}
}

#[async_trait]
impl Worker for Prefetcher {
	fn name(&self) -> String {
		"prefetcher".into()
	}

	async fn work(&mut self, must_exit: &mut watch::Receiver<bool>) -> Result<WorkerStatus, Error> {
		if self.done || *must_exit.borrow() {
			return Ok(WorkerStatus::Done);
		}

		let object = &self.shared.objects[self.object_index];
		if self.offset >= object.size {
			if self.object_index + 1 < self.shared.objects.len() {
				self.object_index += 1;
				self.offset = 0;
				self.shared.progress.set(self.object_index, self.offset);
				return Ok(WorkerStatus::Busy);
			}
			debug!("prefetcher reached end of stream");
			self.done = true;
			self.shared.block_ready.notify_waiters();
			return Ok(WorkerStatus::Done);
		}

		match self.pick_tier() {
			Some(tier_index) => {
				let start = self.offset;
				let end = (start + self.shared.block_size()).min(object.size);
				match self.fetch_and_place(tier_index, start, end).await {
					Ok(()) => {
						self.offset = end;
						self.shared.progress.set(self.object_index, self.offset);
						Ok(WorkerStatus::Busy)
					}
					Err(e) => {
						warn!("prefetcher: failed to stage block at {}+{}: {}", self.object_index, start, e);
						Err(e)
					}
				}
			}
			None => {
				self.shared.metrics.prefetcher_backoff_count.add(&opentelemetry::Context::current(), 1, &[]);
				// Every tier came up short: rather than idling until the
				// evictor's own timer fires, nudge it to sweep right away
				// (spec §4.2 step 2a's "attempt to reclaim slack" path).
				self.shared.evict_now.notify_one();
				tokio::time::sleep(BACKOFF).await;
				Ok(WorkerStatus::Busy)
			}
		}
	}

	async fn wait_for_work(&mut self, _must_exit: &watch::Receiver<bool>) -> WorkerStatus {
		unreachable!("prefetcher's work() never returns Idle")
	}
}
