//! Tiny demo binary exercising the stream API end to end, in the manner
//! of `k2v-client`'s `main.rs`: wire up a concrete client, open a stream,
//! and do one thing with it. No subcommands, no query language — this
//! exists to prove the `core`/`store`/`client` crates actually compose,
//! not to be a real operator tool.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use rusoto_core::Region;
use rusoto_credential::{EnvironmentProvider, ProvideAwsCredentials};
use tokio::io::{stdout, AsyncWriteExt};

use rpf_client::{ObjectStoreClient, S3Client};
use rpf_core::{Stream, StreamOptions, TierSpec};
use rpf_util::error::Error;

/// One `directory:budget_megabytes` staging tier. `budget_megabytes == 0`
/// means "use the directory's current free space" (spec §3).
#[derive(Debug, Clone)]
struct TierArg {
	directory: PathBuf,
	budget_megabytes: u64,
}

impl std::str::FromStr for TierArg {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, String> {
		match s.split_once(':') {
			Some((dir, budget)) => {
				let budget_megabytes = budget
					.parse()
					.map_err(|_| format!("not a byte budget: {:?}", budget))?;
				Ok(TierArg {
					directory: PathBuf::from(dir),
					budget_megabytes,
				})
			}
			None => Ok(TierArg {
				directory: PathBuf::from(s),
				budget_megabytes: 0,
			}),
		}
	}
}

/// Read a concatenated object stream through the rolling prefetch cache
/// and write it to stdout.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opt {
	/// Object paths to concatenate, each "bucket/key" (optionally
	/// "bucket/key?versionId=..."), in read order.
	#[arg(required = true)]
	paths: Vec<String>,

	/// Staging tiers as "directory:budget_megabytes" (budget 0 = live
	/// free space). Repeatable; tried in the order given.
	#[arg(long = "tier", value_name = "DIR[:MB]", required = true)]
	tiers: Vec<TierArg>,

	/// Block size in bytes.
	#[arg(long, default_value_t = 32 * 1024 * 1024)]
	block_size: u64,

	/// Header bytes hidden on every object after the first.
	#[arg(long, default_value_t = 0)]
	header_bytes: u64,

	/// S3-compatible endpoint, e.g. http://localhost:3900.
	#[arg(long, env = "RPF_ENDPOINT")]
	endpoint: String,

	/// Region name to present to the endpoint.
	#[arg(long, env = "RPF_REGION", default_value = "garage")]
	region: String,

	/// Surface `Stalled` if a block hasn't appeared within this many
	/// seconds (default: wait indefinitely, spec §9 open question).
	#[arg(long)]
	block_wait_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let opt = Opt::parse();

	let region = Region::Custom {
		name: opt.region,
		endpoint: opt.endpoint,
	};
	let credentials = EnvironmentProvider::default()
		.credentials()
		.await
		.map_err(|e| Error::Config(format!("no AWS credentials in environment: {}", e)))?;
	let client: Arc<dyn ObjectStoreClient> =
		Arc::new(S3Client::from_credentials_provider(region, StaticCreds(credentials)));

	let tiers = opt
		.tiers
		.into_iter()
		.map(|t| TierSpec {
			directory: t.directory,
			budget_bytes: t.budget_megabytes.saturating_mul(1024 * 1024),
		})
		.collect();

	let mut options = StreamOptions {
		block_size: opt.block_size,
		header_bytes: opt.header_bytes,
		..StreamOptions::default()
	};
	options.block_wait_timeout = opt.block_wait_timeout_secs.map(std::time::Duration::from_secs);

	let mut stream = Stream::open(client, &opt.paths, tiers, options).await?;
	tracing::info!("opened stream: {} bytes", stream.len());

	let mut out = stdout();
	loop {
		let chunk = stream.read(4 * 1024 * 1024).await?;
		if chunk.is_empty() {
			break;
		}
		out.write_all(&chunk).await?;
	}
	out.flush().await?;

	stream.close().await;
	Ok(())
}

/// `rusoto`'s `ProvideAwsCredentials` isn't implemented for a bare
/// `AwsCredentials`; this wraps one so it can be handed to
/// `S3Client::from_credentials_provider` after being resolved once at
/// startup rather than re-read from the environment on every request.
struct StaticCreds(rusoto_credential::AwsCredentials);

#[async_trait]
impl ProvideAwsCredentials for StaticCreds {
	async fn credentials(&self) -> Result<rusoto_credential::AwsCredentials, rusoto_credential::CredentialsError> {
		Ok(self.0.clone())
	}
}
