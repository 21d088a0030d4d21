use async_trait::async_trait;
use bytes::Bytes;
use rusoto_core::{HttpClient, Region};
use rusoto_credential::{ProvideAwsCredentials, StaticProvider};
use rusoto_s3::{GetObjectRequest, HeadObjectRequest, S3, S3Client as RusotoS3Client};
use tokio::io::AsyncReadExt;

use crate::error::Error;
use crate::ObjectId;
use crate::ObjectStoreClient;

/// Concrete `ObjectStoreClient` talking to an S3-compatible HTTP service,
/// built the way `k2v-client`'s CLI wires up its own client: a `rusoto`
/// `Region` plus a credentials provider feeding a typed request builder
/// (here `rusoto_s3` rather than hand-signed K2V requests, since plain
/// GetObject/HeadObject is all this cache needs).
pub struct S3Client {
	inner: RusotoS3Client,
}

impl S3Client {
	pub fn new(region: Region, access_key: String, secret_key: String) -> Self {
		let credentials = StaticProvider::new_minimal(access_key, secret_key);
		let http_client = HttpClient::new().expect("failed to create TLS-backed HTTP client");
		Self {
			inner: RusotoS3Client::new_with(http_client, credentials, region),
		}
	}

	pub fn from_credentials_provider<P>(region: Region, credentials: P) -> Self
	where
		P: ProvideAwsCredentials + Send + Sync + 'static,
	{
		let http_client = HttpClient::new().expect("failed to create TLS-backed HTTP client");
		Self {
			inner: RusotoS3Client::new_with(http_client, credentials, region),
		}
	}
}

#[async_trait]
impl ObjectStoreClient for S3Client {
	async fn size(&self, object: &ObjectId) -> Result<u64, Error> {
		let req = HeadObjectRequest {
			bucket: object.bucket.clone(),
			key: object.key.clone(),
			version_id: object.version.clone(),
			..Default::default()
		};
		let resp = self.inner.head_object(req).await?;
		let len = resp
			.content_length
			.ok_or_else(|| Error::Request("HeadObject response had no content-length".into()))?;
		Ok(len.max(0) as u64)
	}

	async fn get_range(
		&self,
		object: &ObjectId,
		start: u64,
		end_exclusive: u64,
	) -> Result<Bytes, Error> {
		// S3 ranges are inclusive on both ends.
		let range = format!("bytes={}-{}", start, end_exclusive.saturating_sub(1));
		let req = GetObjectRequest {
			bucket: object.bucket.clone(),
			key: object.key.clone(),
			version_id: object.version.clone(),
			range: Some(range),
			..Default::default()
		};
		let resp = self.inner.get_object(req).await?;
		let body = resp
			.body
			.ok_or_else(|| Error::Request("GetObject response had no body".into()))?;

		let mut buf = Vec::with_capacity((end_exclusive - start) as usize);
		body.into_async_read()
			.read_to_end(&mut buf)
			.await
			.map_err(|e| Error::Request(e.to_string()))?;
		Ok(Bytes::from(buf))
	}
}
