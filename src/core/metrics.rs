//! Instrumentation for a single open stream, wired up the way
//! `garage_block::metrics::BlockManagerMetrics` wires counters and
//! histograms off a named `opentelemetry` meter.

use opentelemetry::{
	global,
	metrics::{Counter, Histogram},
};

pub struct StreamMetrics {
	pub bytes_prefetched: Counter<u64>,
	pub bytes_read: Counter<u64>,
	pub bytes_evicted: Counter<u64>,
	pub blocks_written: Counter<u64>,
	pub blocks_evicted: Counter<u64>,
	pub reader_wait_count: Counter<u64>,
	pub prefetcher_backoff_count: Counter<u64>,
	pub fetch_duration: Histogram<f64>,
}

impl StreamMetrics {
	pub fn new() -> Self {
		let meter = global::meter("rpf_core");
		Self {
			bytes_prefetched: meter
				.u64_counter("rpf_bytes_prefetched")
				.with_description("Bytes fetched from the object store and staged to a tier")
				.init(),
			bytes_read: meter
				.u64_counter("rpf_bytes_read")
				.with_description("Bytes returned to the reader from staged or direct-fetched blocks")
				.init(),
			bytes_evicted: meter
				.u64_counter("rpf_bytes_evicted")
				.with_description("Bytes reclaimed from tiers by the evictor")
				.init(),
			blocks_written: meter
				.u64_counter("rpf_blocks_written")
				.with_description("Blocks committed to a tier by the prefetcher")
				.init(),
			blocks_evicted: meter
				.u64_counter("rpf_blocks_evicted")
				.with_description("Consumed blocks unlinked by the evictor")
				.init(),
			reader_wait_count: meter
				.u64_counter("rpf_reader_wait_count")
				.with_description("Times the reader had to wait for a block the prefetcher hadn't staged yet")
				.init(),
			prefetcher_backoff_count: meter
				.u64_counter("rpf_prefetcher_backoff_count")
				.with_description("Times the prefetcher found every tier full and backed off")
				.init(),
			fetch_duration: meter
				.f64_histogram("rpf_fetch_duration_seconds")
				.with_description("Latency of a single ranged GET against the object store")
				.init(),
		}
	}
}

impl Default for StreamMetrics {
	fn default() -> Self {
		Self::new()
	}
}
