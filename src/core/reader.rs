//! The consumer-facing read/seek/close surface of an open stream
//! (spec §4.4). A `Reader` is not `Sync`-shared: each stream hands out a
//! single reader that owns its own cursor and currently-open block.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use rpf_client::ObjectStoreClient;
use rpf_util::error::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::shared::Shared;

/// Where a `seek` origin is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
	Start,
	Current,
	End,
}

enum OpenBlock {
	/// A block found in a tier's staging directory: read straight off
	/// disk through a plain file handle.
	Staged {
		file: tokio::fs::File,
		path: PathBuf,
		object_index: usize,
		b_start: u64,
		b_end: u64,
	},
	/// A block fetched directly from the object store because the
	/// prefetcher had already passed it over — never staged, never
	/// marked consumed (spec §9 resolved open question on re-seek).
	Direct {
		data: Bytes,
		cursor: usize,
		object_index: usize,
		b_start: u64,
		b_end: u64,
	},
}

impl OpenBlock {
	fn covers(&self, object_index: usize, offset_in_object: u64) -> bool {
		let (oi, b_start, b_end) = match self {
			OpenBlock::Staged {
				object_index,
				b_start,
				b_end,
				..
			} => (*object_index, *b_start, *b_end),
			OpenBlock::Direct {
				object_index,
				b_start,
				b_end,
				..
			} => (*object_index, *b_start, *b_end),
		};
		oi == object_index && offset_in_object >= b_start && offset_in_object < b_end
	}
}

pub struct Reader {
	shared: Arc<Shared>,
	logical_pos: u64,
	open_block: Option<OpenBlock>,
	closed: bool,
}

impl Reader {
	pub fn new(shared: Arc<Shared>) -> Self {
		Self {
			shared,
			logical_pos: 0,
			open_block: None,
			closed: false,
		}
	}

	pub fn position(&self) -> u64 {
		self.logical_pos
	}

	pub fn len(&self) -> u64 {
		self.shared.logical_size()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Read up to `n` bytes; `n < 0` reads to the end of the stream
	/// (spec §4.4 `read`). Returns fewer bytes than asked only at EOF.
	pub async fn read(&mut self, n: i64) -> Result<Bytes, Error> {
		if self.closed {
			return Err(Error::ClosedStream);
		}
		let remaining = self.shared.logical_size().saturating_sub(self.logical_pos);
		let want = if n < 0 { remaining } else { (n as u64).min(remaining) };
		if want == 0 {
			return Ok(Bytes::new());
		}

		let mut out = Vec::with_capacity(want as usize);
		while (out.len() as u64) < want {
			self.ensure_block().await?;
			let (object_index, offset_in_object) = self.shared.locate(self.logical_pos);

			let remaining_wanted = want - out.len() as u64;
			let chunk = match self.open_block.as_mut().expect("ensure_block populates open_block") {
				OpenBlock::Staged { file, b_end, .. } => {
					let remaining_in_block = *b_end - offset_in_object;
					let read_len = remaining_wanted.min(remaining_in_block) as usize;
					let mut buf = vec![0u8; read_len];
					file.read_exact(&mut buf).await?;
					buf
				}
				OpenBlock::Direct { data, cursor, b_end, .. } => {
					let remaining_in_block = *b_end - offset_in_object;
					let read_len = remaining_wanted.min(remaining_in_block) as usize;
					let buf = data[*cursor..*cursor + read_len].to_vec();
					*cursor += read_len;
					buf
				}
			};

			let read_len = chunk.len() as u64;
			out.extend_from_slice(&chunk);
			self.logical_pos += read_len;
			self.shared.metrics.bytes_read.add(
				&opentelemetry::Context::current(),
				read_len,
				&[],
			);

			let block_exhausted = matches!(
				&self.open_block,
				Some(b) if !b.covers(object_index, offset_in_object + read_len)
			);
			if block_exhausted {
				self.retire_open_block(true).await;
			}
		}

		Ok(Bytes::from(out))
	}

	/// Reposition the cursor (spec §4.4 `seek`). Does not mark the
	/// abandoned block consumed — it stays ready for a later reader, or
	/// for the evictor once genuinely passed over.
	pub async fn seek(&mut self, pos: i64, whence: Whence) -> Result<u64, Error> {
		if self.closed {
			return Err(Error::ClosedStream);
		}
		let base: i64 = match whence {
			Whence::Start => 0,
			Whence::Current => self.logical_pos as i64,
			Whence::End => self.shared.logical_size() as i64,
		};
		let target = base
			.checked_add(pos)
			.ok_or_else(|| Error::Message("seek overflow".into()))?;
		if target < 0 {
			return Err(Error::Message("seek before start of stream".into()));
		}
		let target = (target as u64).min(self.shared.logical_size());

		if self.logical_pos != target {
			self.retire_open_block(false).await;
			self.logical_pos = target;
		}
		Ok(self.logical_pos)
	}

	/// Close the reader. Idempotent; safe to call more than once.
	pub async fn close(&mut self) {
		if self.closed {
			return;
		}
		self.retire_open_block(false).await;
		self.closed = true;
	}

	async fn retire_open_block(&mut self, exhausted: bool) {
		if let Some(OpenBlock::Staged { path, .. }) = self.open_block.take() {
			if exhausted {
				let _ = self.shared.store.mark_consumed(&path).await;
			}
		}
	}

	/// Ensure `open_block` covers the current logical position, staging
	/// or waiting as needed (spec §4.4 `locate_block`).
	async fn ensure_block(&mut self) -> Result<(), Error> {
		let (object_index, offset_in_object) = self.shared.locate(self.logical_pos);

		if let Some(block) = &self.open_block {
			if block.covers(object_index, offset_in_object) {
				return Ok(());
			}
		}
		self.retire_open_block(false).await;

		let object = &self.shared.objects[object_index];
		let key = object.key.clone();
		let b_start = self.shared.block_start(offset_in_object);
		let b_end = (b_start + self.shared.block_size()).min(object.size);

		let deadline = self.shared.options.block_wait_timeout.map(|t| Instant::now() + t);
		let mut waited = false;

		loop {
			if let Some((path, _tier)) = self.shared.store.lookup(&key, b_start) {
				let mut file = tokio::fs::File::open(&path).await?;
				file.seek(SeekFrom::Start(offset_in_object - b_start)).await?;
				self.open_block = Some(OpenBlock::Staged {
					file,
					path,
					object_index,
					b_start,
					b_end,
				});
				return Ok(());
			}

			if self.shared.progress.is_behind(object_index, b_start) {
				let data = self
					.shared
					.client
					.get_range(&object.object_id(), b_start, b_end)
					.await
					.map_err(rpf_util::error::Error::from)?;
				let b_end = b_start + data.len() as u64;
				self.open_block = Some(OpenBlock::Direct {
					data,
					cursor: (offset_in_object - b_start) as usize,
					object_index,
					b_start,
					b_end,
				});
				return Ok(());
			}

			if let Some(deadline) = deadline {
				if Instant::now() >= deadline {
					return Err(Error::Stalled(self.shared.options.block_wait_timeout.unwrap()));
				}
			}
			if !waited {
				self.shared.metrics.reader_wait_count.add(&opentelemetry::Context::current(), 1, &[]);
				waited = true;
			}
			self.wait_for_block(deadline).await;
		}
	}

	async fn wait_for_block(&self, deadline: Option<Instant>) {
		let notified = self.shared.block_ready.notified();
		let poll = self.shared.options.block_wait_poll;
		let sleep = tokio::time::sleep(match deadline {
			Some(d) => poll.min(d.saturating_duration_since(Instant::now())),
			None => poll,
		});
		tokio::select! {
			_ = notified => {}
			_ = sleep => {}
		}
	}
}
