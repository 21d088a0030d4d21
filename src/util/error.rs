//! Error taxonomy for the rolling prefetch cache (see spec §7).
//!
//! Worker threads (prefetcher, evictor) never propagate these upward: they
//! log and either resume or exit. The reader is the only component that
//! surfaces an `Error` across its public API, and only for contract
//! violations on that API (closed stream, stall timeout) or fatal
//! construction-time failures.

use std::time::Duration;

use err_derive::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error(display = "I/O error: {}", _0)]
	Io(#[error(source)] std::io::Error),

	#[error(display = "Invalid configuration file: {}", _0)]
	Toml(#[error(source)] toml::de::Error),

	#[error(display = "Configuration error: {}", _0)]
	Config(String),

	#[error(display = "Object store error: {}", _0)]
	ObjectStore(String),

	#[error(display = "Stream is closed")]
	ClosedStream,

	#[error(display = "No block appeared within {:?}, prefetcher may be stalled", _0)]
	Stalled(Duration),

	#[error(display = "{}", _0)]
	Message(String),
}

impl From<String> for Error {
	fn from(s: String) -> Error {
		Error::Message(s)
	}
}

impl From<&str> for Error {
	fn from(s: &str) -> Error {
		Error::Message(s.to_string())
	}
}
