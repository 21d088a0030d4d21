//! Object-store client interface consumed by the rolling prefetch cache
//! (spec §6 "Object-store interface consumed").
//!
//! `ObjectStoreClient` is the only thing the prefetcher and stream
//! controller know about the remote side; everything about *how* bytes
//! are fetched — signing, retries, TLS — lives behind it. `S3Client` is
//! the one concrete implementation, built the way `k2v-client` builds
//! its own S3-compatible client: a `rusoto` region/credentials pair
//! feeding a typed request builder.

pub mod error;
pub mod path;
pub mod s3;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use error::Error;
pub use path::split_path;
pub use s3::S3Client;

use async_trait::async_trait;
use bytes::Bytes;

/// A source object's stable identity (spec §3 "Logical stream").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId {
	pub bucket: String,
	pub key: String,
	pub version: Option<String>,
}

/// The object-store interface consumed by this crate (spec §6). All
/// methods are fallible; construction-time failures (size queries) are
/// fatal per spec §4.5/§7, transient failures during prefetch are not.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
	/// Total size in bytes of the named object.
	async fn size(&self, object: &ObjectId) -> Result<u64, Error>;

	/// Fetch `[start, end_exclusive)` of the named object. The final
	/// block of an object may be short; the returned length is
	/// authoritative and may be less than `end_exclusive - start` if the
	/// object ends first.
	async fn get_range(
		&self,
		object: &ObjectId,
		start: u64,
		end_exclusive: u64,
	) -> Result<Bytes, Error>;
}
