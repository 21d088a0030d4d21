//! Periodic sweep that unlinks consumed blocks and credits their bytes
//! back to each tier's budget (spec §4.3). Grounded on
//! `garage_block::repair::RepairWorker`'s periodic-`Worker` shape: sleep,
//! sweep, repeat, with a final sweep on shutdown so a closed stream
//! doesn't leak staged bytes.

use std::sync::Arc;

use async_trait::async_trait;
use rpf_util::background::{Worker, WorkerStatus};
use rpf_util::error::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::shared::Shared;

pub struct Evictor {
	shared: Arc<Shared>,
	did_final_sweep: bool,
}

impl Evictor {
	pub fn new(shared: Arc<Shared>) -> Self {
		Self {
			shared,
			did_final_sweep: false,
		}
	}

	async fn sweep(&self) {
		for tier_index in 0..self.shared.store.tiers().len() {
			let (reclaimed, reclaimed_bytes) = self
				.shared
				.store
				.reclaim_consumed(tier_index, &self.shared.known_deleted_names)
				.await;
			if reclaimed > 0 {
				debug!("evictor: reclaimed {} block(s) from tier {}", reclaimed, tier_index);
				let ctx = opentelemetry::Context::current();
				self.shared.metrics.blocks_evicted.add(&ctx, reclaimed as u64, &[]);
				self.shared.metrics.bytes_evicted.add(&ctx, reclaimed_bytes, &[]);
			}
		}
	}
}

#[async_trait]
impl Worker for Evictor {
	fn name(&self) -> String {
		"evictor".into()
	}

	async fn work(&mut self, must_exit: &mut watch::Receiver<bool>) -> Result<WorkerStatus, Error> {
		if *must_exit.borrow() {
			if self.did_final_sweep {
				return Ok(WorkerStatus::Done);
			}
			self.sweep().await;
			self.did_final_sweep = true;
			return Ok(WorkerStatus::Done);
		}

		self.sweep().await;

		tokio::select! {
			_ = tokio::time::sleep(self.shared.options.eviction_interval) => {}
			_ = self.shared.evict_now.notified() => {}
			_ = must_exit.changed() => {}
		}
		Ok(WorkerStatus::Busy)
	}

	async fn wait_for_work(&mut self, _must_exit: &watch::Receiver<bool>) -> WorkerStatus {
		unreachable!("evictor's work() never returns Idle")
	}
}
