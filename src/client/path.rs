use crate::error::Error;

/// Parse a `"bucket/key"` path string, as accepted by `stream::open`'s
/// `paths` argument (spec §6). An optional `?versionId=...` suffix on the
/// key selects a specific object version, mirroring the S3 GetObject
/// query parameter of the same name.
pub fn split_path(path: &str) -> Result<(String, String, Option<String>), Error> {
	let mut it = path.splitn(2, '/');
	let bucket = it.next().filter(|s| !s.is_empty());
	let rest = it.next().filter(|s| !s.is_empty());

	let (bucket, rest) = match (bucket, rest) {
		(Some(b), Some(r)) => (b, r),
		_ => return Err(Error::BadPath(path.to_string())),
	};

	match rest.split_once("?versionId=") {
		Some((key, version)) if !key.is_empty() && !version.is_empty() => {
			Ok((bucket.to_string(), key.to_string(), Some(version.to_string())))
		}
		Some(_) => Err(Error::BadPath(path.to_string())),
		None => Ok((bucket.to_string(), rest.to_string(), None)),
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn splits_bucket_and_key() {
		let (bucket, key, version) = split_path("my-bucket/some/nested/key.bin").unwrap();
		assert_eq!(bucket, "my-bucket");
		assert_eq!(key, "some/nested/key.bin");
		assert_eq!(version, None);
	}

	#[test]
	fn splits_version_suffix() {
		let (bucket, key, version) = split_path("b/k?versionId=abc123").unwrap();
		assert_eq!(bucket, "b");
		assert_eq!(key, "k");
		assert_eq!(version, Some("abc123".to_string()));
	}

	#[test]
	fn rejects_missing_key() {
		assert!(split_path("just-a-bucket").is_err());
		assert!(split_path("").is_err());
	}
}
