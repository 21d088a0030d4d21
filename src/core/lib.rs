//! Prefetcher, evictor, reader and stream controller for the rolling
//! prefetch cache (spec §4). `stream::Stream::open` is the entry point;
//! everything else in this crate exists to make that one call correct
//! under concurrent reading, staging and eviction.

pub mod evictor;
pub mod metrics;
pub mod prefetcher;
pub mod progress;
pub mod reader;
pub mod shared;
pub mod stream;

#[cfg(test)]
mod tests;

pub use reader::Whence;
pub use shared::{SourceObject, StreamOptions};
pub use stream::{Stream, TierSpec};
