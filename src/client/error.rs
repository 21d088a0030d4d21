use thiserror::Error;

/// Errors from the object-store client. Transient variants (`Http`,
/// `Rusoto`) are what the prefetcher logs and retries on (spec §7); `
/// BadPath` and `NotVersionAware` are configuration errors, fatal at
/// stream construction.
#[derive(Debug, Error)]
pub enum Error {
	#[error("malformed object path {0:?}: expected \"bucket/key\"")]
	BadPath(String),

	#[error("a version was specified but the object store is not version-aware")]
	NotVersionAware,

	#[error("object store request failed: {0}")]
	Request(String),

	#[error("object not found")]
	NotFound,
}

impl<E: std::error::Error + 'static> From<rusoto_core::RusotoError<E>> for Error {
	fn from(e: rusoto_core::RusotoError<E>) -> Error {
		Error::Request(e.to_string())
	}
}

impl From<Error> for rpf_util::error::Error {
	fn from(e: Error) -> rpf_util::error::Error {
		rpf_util::error::Error::ObjectStore(e.to_string())
	}
}
