use std::path::PathBuf;

use rand::prelude::*;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::key::flatten_key;

/// A block under construction. Bytes land in a hidden temporary name;
/// `commit` fsyncs the data, atomically renames it to the canonical
/// `<key>.<off>`, then fsyncs the containing directory so the rename
/// itself is durable (grounded on `BlockManagerLocked::write_block`'s
/// tmp-then-rename-then-dir-fsync sequence).
///
/// If dropped without being committed, the temporary file is removed on
/// a best-effort basis so a crashed or cancelled prefetch attempt never
/// leaves a visible-but-incomplete sibling behind.
pub struct BlockWriter {
	tmp_path: Option<PathBuf>,
	final_path: PathBuf,
	directory: PathBuf,
	file: Option<fs::File>,
}

impl BlockWriter {
	pub(crate) async fn create(
		directory: PathBuf,
		_tier_index: usize,
		key: &str,
		offset: u64,
	) -> std::io::Result<Self> {
		fs::create_dir_all(&directory).await?;

		let flat = flatten_key(key);
		let final_path = directory.join(format!("{}.{}", flat, offset));

		let suffix: [u8; 4] = thread_rng().gen();
		let tmp_path = directory.join(format!(".{}.{}.tmp{}", flat, offset, hex::encode(suffix)));

		let file = fs::File::create(&tmp_path).await?;

		Ok(Self {
			tmp_path: Some(tmp_path),
			final_path,
			directory,
			file: Some(file),
		})
	}

	pub fn final_path(&self) -> &std::path::Path {
		&self.final_path
	}

	pub async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
		self.file
			.as_mut()
			.expect("write_all called after commit")
			.write_all(data)
			.await
	}

	/// Commit the block: fsync the data, atomically publish it under its
	/// canonical name, fsync the directory. Returns the canonical path.
	pub async fn commit(mut self) -> std::io::Result<PathBuf> {
		let file = self.file.take().expect("commit called twice");
		file.sync_all().await?;
		drop(file);

		let tmp_path = self.tmp_path.take().expect("commit called twice");
		fs::rename(&tmp_path, &self.final_path).await?;

		if let Ok(dir) = fs::File::open(&self.directory).await {
			let _ = dir.sync_all().await;
		}

		Ok(self.final_path.clone())
	}
}

impl Drop for BlockWriter {
	fn drop(&mut self) {
		if let Some(path) = self.tmp_path.take() {
			tokio::spawn(async move {
				if let Err(e) = fs::remove_file(&path).await {
					tracing::debug!("BlockWriter drop cleanup failed for {}: {}", path.display(), e);
				}
			});
		}
	}
}
