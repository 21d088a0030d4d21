//! Small helper for recording the duration of a future against an
//! opentelemetry histogram, in the style `garage_block::manager` consumes
//! `garage_util::metrics::RecordDuration` (`.bound_record_duration(...)`).

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use opentelemetry::{metrics::Histogram, Context};

pub trait RecordDuration: Future + Sized + Send {
	fn bound_record_duration<'a>(
		self,
		histogram: &'a Histogram<f64>,
	) -> Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>
	where
		Self: 'a,
	{
		Box::pin(async move {
			let start = Instant::now();
			let out = self.await;
			histogram.record(&Context::current(), start.elapsed().as_secs_f64(), &[]);
			out
		})
	}
}

impl<T> RecordDuration for T where T: Future + Send {}
