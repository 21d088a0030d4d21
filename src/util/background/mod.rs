//! Background worker driver shared by the prefetcher and evictor.
//!
//! A stream has exactly two long-lived workers (spec §4.2–§4.3), so unlike
//! the ambient job-queue this is adapted from, there is no generic job
//! scheduling here: just a small pool that drives `Worker` impls to
//! completion and drains them within a bounded grace period on shutdown.

pub mod worker;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

pub use worker::{Worker, WorkerStatus};
use worker::WorkerProcessor;

/// Drives a fixed set of `Worker` impls until the shared stop signal fires.
pub struct BackgroundRunner {
	send_worker: mpsc::UnboundedSender<Box<dyn Worker>>,
}

impl BackgroundRunner {
	/// Create a new runner. Returns the runner handle plus a join handle
	/// that resolves once every worker has drained (or the grace period
	/// has elapsed).
	pub fn new(stop_signal: watch::Receiver<bool>) -> (Arc<Self>, tokio::task::JoinHandle<()>) {
		let (send_worker, worker_out) = mpsc::unbounded_channel::<Box<dyn Worker>>();

		let await_all_done =
			tokio::spawn(async move { WorkerProcessor::new(worker_out, stop_signal).run().await });

		(Arc::new(Self { send_worker }), await_all_done)
	}

	pub fn spawn_worker<W>(&self, worker: W)
	where
		W: Worker + 'static,
	{
		self.send_worker
			.send(Box::new(worker))
			.ok()
			.expect("Could not put worker in queue");
	}
}
