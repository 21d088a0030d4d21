//! An in-memory `ObjectStoreClient` used by this workspace's own tests so
//! the prefetcher/reader/evictor interplay can be exercised without a
//! network dependency.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Error;
use crate::{ObjectId, ObjectStoreClient};

pub struct FakeObjectStoreClient {
	objects: Mutex<HashMap<(String, String), Bytes>>,
	/// When set, every `get_range` call sleeps this long before
	/// returning, to let tests exercise the reader's bounded wait.
	pub latency: Option<std::time::Duration>,
}

impl FakeObjectStoreClient {
	pub fn new() -> Self {
		Self {
			objects: Mutex::new(HashMap::new()),
			latency: None,
		}
	}

	pub fn put(&self, bucket: &str, key: &str, data: Vec<u8>) {
		self.objects
			.lock()
			.unwrap()
			.insert((bucket.to_string(), key.to_string()), Bytes::from(data));
	}
}

impl Default for FakeObjectStoreClient {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ObjectStoreClient for FakeObjectStoreClient {
	async fn size(&self, object: &ObjectId) -> Result<u64, Error> {
		let objects = self.objects.lock().unwrap();
		let data = objects
			.get(&(object.bucket.clone(), object.key.clone()))
			.ok_or(Error::NotFound)?;
		Ok(data.len() as u64)
	}

	async fn get_range(
		&self,
		object: &ObjectId,
		start: u64,
		end_exclusive: u64,
	) -> Result<Bytes, Error> {
		if let Some(delay) = self.latency {
			tokio::time::sleep(delay).await;
		}
		let objects = self.objects.lock().unwrap();
		let data = objects
			.get(&(object.bucket.clone(), object.key.clone()))
			.ok_or(Error::NotFound)?;
		let start = start.min(data.len() as u64) as usize;
		let end = end_exclusive.min(data.len() as u64) as usize;
		Ok(data.slice(start..end))
	}
}
