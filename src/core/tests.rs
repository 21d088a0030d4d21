//! Integration tests driving the full prefetcher/reader/evictor loop
//! through an in-memory object store (spec §8's concrete scenarios).
//! No mocked filesystem: tiers are real temp directories, matching the
//! teacher's own preference for exercising real I/O in tests rather than
//! stubbing it out (cf. `rpf_store::test`, `garage_db`'s test style).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use rpf_client::fake::FakeObjectStoreClient;

use crate::{Stream, StreamOptions, TierSpec, Whence};

fn random_bytes(len: usize) -> Vec<u8> {
	let mut buf = vec![0u8; len];
	rand::thread_rng().fill_bytes(&mut buf);
	buf
}

fn one_tier(budget_bytes: u64) -> (mktemp::Temp, Vec<TierSpec>) {
	let dir = mktemp::Temp::new_dir().unwrap();
	let tiers = vec![TierSpec {
		directory: dir.to_path_buf(),
		budget_bytes,
	}];
	(dir, tiers)
}

fn options(block_size: u64, header_bytes: u64) -> StreamOptions {
	StreamOptions {
		block_size,
		header_bytes,
		block_wait_poll: Duration::from_millis(10),
		eviction_interval: Duration::from_millis(20),
		..StreamOptions::default()
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_object_read_all() {
	const B: usize = 256 * 1024;
	let data = random_bytes(4 * B);

	let client = Arc::new(FakeObjectStoreClient::new());
	client.put("bucket", "obj", data.clone());

	let (dir, tiers) = one_tier(1024 * 1024);
	let mut stream = Stream::open(client, &["bucket/obj".to_string()], tiers, options(B as u64, 0))
		.await
		.unwrap();

	assert_eq!(stream.len(), data.len() as u64);
	let out = stream.read(-1).await.unwrap();
	assert_eq!(out.as_ref(), data.as_slice());

	stream.close().await;

	// Every ready/consumed block staged during the read is unlinked
	// within the shutdown grace (spec §3 invariant 6, §8 eviction
	// liveness).
	let remaining: Vec<_> = std::fs::read_dir(dir.to_path_buf())
		.unwrap()
		.filter_map(|e| e.ok())
		.collect();
	assert!(remaining.is_empty(), "leftover staged files: {:?}", remaining);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn multi_block_chunked_read_matches_single_read() {
	const B: usize = 256 * 1024;
	let data = random_bytes(4 * B);

	let client = Arc::new(FakeObjectStoreClient::new());
	client.put("bucket", "obj", data.clone());

	let (_dir, tiers) = one_tier(1024 * 1024);
	let mut stream = Stream::open(client, &["bucket/obj".to_string()], tiers, options(B as u64, 0))
		.await
		.unwrap();

	let mut out = Vec::new();
	out.extend_from_slice(&stream.read((B + 256) as i64).await.unwrap());
	out.extend_from_slice(&stream.read((B - 256) as i64).await.unwrap());
	out.extend_from_slice(&stream.read(-1).await.unwrap());

	assert_eq!(out, data);
	stream.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn four_object_concatenation_with_no_header_skip() {
	const B: usize = 64 * 1024;
	let objects: Vec<Vec<u8>> = (0..4).map(|_| random_bytes(2 * B)).collect();

	let client = Arc::new(FakeObjectStoreClient::new());
	let mut paths = Vec::new();
	for (i, data) in objects.iter().enumerate() {
		let key = format!("obj{}", i);
		client.put("bucket", &key, data.clone());
		paths.push(format!("bucket/{}", key));
	}

	let (_dir, tiers) = one_tier(0);
	let mut stream = Stream::open(client, &paths, tiers, options(B as u64, 0)).await.unwrap();

	assert_eq!(stream.len(), (4 * 2 * B) as u64);
	for data in &objects {
		let out = stream.read((2 * B) as i64).await.unwrap();
		assert_eq!(out.as_ref(), data.as_slice());
	}
	assert!(stream.read(-1).await.unwrap().is_empty());

	stream.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn header_skip_hides_leading_bytes_on_every_object_after_the_first() {
	const B: usize = 64 * 1024;
	const H: usize = 1000;
	let o0 = random_bytes(2 * B);
	let o1 = random_bytes(2 * B);

	let client = Arc::new(FakeObjectStoreClient::new());
	client.put("bucket", "o0", o0.clone());
	client.put("bucket", "o1", o1.clone());

	let (_dir, tiers) = one_tier(0);
	let paths = vec!["bucket/o0".to_string(), "bucket/o1".to_string()];
	let mut stream = Stream::open(client, &paths, tiers, options(B as u64, H as u64))
		.await
		.unwrap();

	let expected_len = (2 * B + (2 * B - H)) as u64;
	assert_eq!(stream.len(), expected_len);

	let out = stream.read(-1).await.unwrap();
	let mut expected = o0.clone();
	expected.extend_from_slice(&o1[H..]);
	assert_eq!(out.as_ref(), expected.as_slice());

	stream.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tight_tier_never_exceeds_budget_by_more_than_one_block() {
	const B: u64 = 64 * 1024;
	let budget = 2 * B;
	let data = random_bytes((8 * B) as usize);

	let client = Arc::new(FakeObjectStoreClient::new());
	client.put("bucket", "obj", data.clone());

	let (dir, tiers) = one_tier(budget);
	let mut opts = options(B, 0);
	opts.eviction_interval = Duration::from_millis(10);
	let mut stream = Stream::open(client, &["bucket/obj".to_string()], tiers, opts).await.unwrap();

	let watch_dir = dir.to_path_buf();
	let max_seen = Arc::new(AtomicU64::new(0));
	let stop = Arc::new(AtomicBool::new(false));
	let (max_seen2, stop2) = (max_seen.clone(), stop.clone());
	let monitor = tokio::spawn(async move {
		while !stop2.load(Ordering::Relaxed) {
			let mut total = 0u64;
			if let Ok(mut rd) = tokio::fs::read_dir(&watch_dir).await {
				while let Ok(Some(entry)) = rd.next_entry().await {
					let name = entry.file_name();
					let name = name.to_string_lossy();
					if name.starts_with('.') || name.ends_with(rpf_store::DELETED_SUFFIX) {
						continue;
					}
					if let Ok(meta) = entry.metadata().await {
						total += meta.len();
					}
				}
			}
			max_seen2.fetch_max(total, Ordering::Relaxed);
			tokio::time::sleep(Duration::from_millis(2)).await;
		}
	});

	let out = stream.read(-1).await.unwrap();
	assert_eq!(out.as_ref(), data.as_slice());

	stop.store(true, Ordering::Relaxed);
	let _ = monitor.await;

	let observed_max = max_seen.load(Ordering::Relaxed);
	assert!(
		observed_max <= budget + B,
		"tier held {} ready bytes at once, budget + B = {}",
		observed_max,
		budget + B
	);

	stream.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn seek_backward_across_a_consumed_block_refetches_directly() {
	const B: usize = 256 * 1024;
	let data = random_bytes(4 * B);

	let client = Arc::new(FakeObjectStoreClient::new());
	client.put("bucket", "obj", data.clone());

	let (_dir, tiers) = one_tier(1024 * 1024);
	let mut stream = Stream::open(client, &["bucket/obj".to_string()], tiers, options(B as u64, 0))
		.await
		.unwrap();

	// Consume the first two blocks.
	let _ = stream.read((2 * B) as i64).await.unwrap();

	// Seek back into the middle of the (now consumed) first block and
	// re-read a full block's worth; this must fall back to a direct GET
	// since block 0 is gone (spec §9 resolved re-seek open question).
	let seek_target = (B / 2) as i64;
	stream.seek(seek_target, Whence::Start).await.unwrap();
	let out = stream.read(B as i64).await.unwrap();

	assert_eq!(out.as_ref(), &data[B / 2..B / 2 + B]);

	stream.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn seek_past_end_then_read_returns_empty() {
	const B: usize = 64 * 1024;
	let data = random_bytes(2 * B);

	let client = Arc::new(FakeObjectStoreClient::new());
	client.put("bucket", "obj", data.clone());

	let (_dir, tiers) = one_tier(0);
	let mut stream = Stream::open(client, &["bucket/obj".to_string()], tiers, options(B as u64, 0))
		.await
		.unwrap();

	let pos = stream.seek(1_000_000, Whence::Start).await.unwrap();
	assert_eq!(pos, stream.len());
	assert!(stream.read(-1).await.unwrap().is_empty());

	stream.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_is_idempotent() {
	let client = Arc::new(FakeObjectStoreClient::new());
	client.put("bucket", "obj", random_bytes(1024));

	let (_dir, tiers) = one_tier(0);
	let mut stream = Stream::open(client, &["bucket/obj".to_string()], tiers, options(1024, 0))
		.await
		.unwrap();

	stream.close().await;
	stream.close().await;
}

#[tokio::test]
async fn open_rejects_empty_path_list() {
	let client = Arc::new(FakeObjectStoreClient::new());
	let (_dir, tiers) = one_tier(0);
	let result = Stream::open(client, &[], tiers, options(1024, 0)).await;
	assert!(result.is_err());
}
