//! Configuration for the rolling prefetch cache.
//!
//! The primary entry point is the programmatic `stream::open(...)` call
//! (spec §6); this `Config` exists for the CLI demo and to carry the
//! stall-timeout and tiering defaults a caller would otherwise repeat at
//! every call site.
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// One staging tier: an ordered `(directory, byte-budget)` pair (spec §3).
/// A budget of `0` means "use the tier's current free space".
#[derive(Deserialize, Debug, Clone)]
pub struct TierConfig {
	pub directory: PathBuf,
	/// Budget in megabytes; `0` means live free space.
	#[serde(default)]
	pub budget_megabytes: u64,
}

impl TierConfig {
	pub fn budget_bytes(&self) -> u64 {
		self.budget_megabytes.saturating_mul(1024 * 1024)
	}
}

/// Whole-cache configuration, as read from a TOML file for the CLI demo.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
	/// Size of prefetch blocks, in bytes.
	#[serde(default = "default_block_size")]
	pub block_size: u64,

	/// Header bytes to hide on every source object after the first.
	#[serde(default)]
	pub header_bytes: u64,

	/// Ordered staging tiers, tried in list order for placement.
	pub prefetch_storage: Vec<TierConfig>,

	/// How often the evictor sweeps for consumed blocks to unlink.
	#[serde(default = "default_eviction_interval_ms")]
	pub eviction_interval_ms: u64,

	/// Bounded wait for a not-yet-staged block, in milliseconds.
	#[serde(default = "default_block_wait_poll_ms")]
	pub block_wait_poll_ms: u64,

	/// If set, `locate_block` gives up and returns `Error::Stalled` after
	/// this much total wait time for a single block (spec §9, open
	/// question: stall handling). `None` means wait indefinitely.
	#[serde(default)]
	pub block_wait_timeout: Option<DurationSeconds>,
}

/// A plain number of seconds, so the TOML file stays human-editable.
pub type DurationSeconds = u64;

impl Config {
	pub fn block_wait_timeout(&self) -> Option<Duration> {
		self.block_wait_timeout.map(Duration::from_secs)
	}
}

fn default_block_size() -> u64 {
	32 * 1024 * 1024
}
fn default_eviction_interval_ms() -> u64 {
	5_000
}
fn default_block_wait_poll_ms() -> u64 {
	100
}

/// Read and parse configuration from a TOML file.
pub fn read_config(config_file: PathBuf) -> Result<Config, Error> {
	let mut file = std::fs::OpenOptions::new()
		.read(true)
		.open(config_file.as_path())?;

	let mut config = String::new();
	file.read_to_string(&mut config)?;

	if config.is_empty() {
		return Err(Error::Config("configuration file is empty".into()));
	}

	Ok(toml::from_str(&config)?)
}
