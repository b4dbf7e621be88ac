// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Parity.

// Parity is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity.  If not, see <http://www.gnu.org/licenses/>.

use std::convert::TryInto;
use std::path::Path;

use parking_lot::Mutex;

use crate::error::Result;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

fn fnv1a(bytes: &[u8]) -> u32 {
	let mut hash = FNV_OFFSET_BASIS;
	for &b in bytes {
		hash ^= b as u32;
		hash = hash.wrapping_mul(FNV_PRIME);
	}
	hash
}

/// A persistent multimap from byte-string keys to ordered sequences of
/// 64-bit offsets, striped across a fixed number of lock buckets.
///
/// The backing store is an embedded sorted-map engine (`sled`), opened as
/// a directory; per-key updates are wrapped in a stripe mutex so that the
/// read-append-write sequence in [`HashIndex::add`]/[`HashIndex::undo`]
/// observes a consistent value.
pub struct HashIndex {
	db: sled::Db,
	locks: Vec<Mutex<()>>,
}

impl HashIndex {
	/// Opens (creating if necessary) a hash index directory at `path`
	/// with `stripes` lock partitions.
	pub fn open(path: &Path, stripes: usize) -> Result<HashIndex> {
		let db = sled::open(path)?;
		let locks = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
		log::debug!(target: "collie-db", "opened hash index {:?} with {} stripes", path, stripes);
		Ok(HashIndex { db, locks })
	}

	fn stripe(&self, key: &[u8]) -> usize {
		fnv1a(key) as usize % self.locks.len()
	}

	/// Appends `offset` to `key`'s value list. A no-op for an empty key.
	pub fn add(&self, key: &[u8], offset: i64) -> Result<()> {
		if key.is_empty() {
			return Ok(());
		}
		let stripe = self.stripe(key);
		let _guard = self.locks[stripe].lock();

		let mut value = self.db.get(key)?.map(|v| v.to_vec()).unwrap_or_default();
		value.extend_from_slice(&offset.to_be_bytes());
		self.db.insert(key, value)?;
		log::trace!(target: "collie-db", "index add key-stripe {} offset {}", stripe, offset);
		Ok(())
	}

	/// Returns the offsets recorded for `key`, in insertion order. An
	/// absent key yields an empty vector.
	pub fn get(&self, key: &[u8]) -> Result<Vec<i64>> {
		match self.db.get(key)? {
			Some(value) => Ok(value
				.chunks_exact(8)
				.map(|c| i64::from_be_bytes(c.try_into().expect("chunks_exact(8)")))
				.collect()),
			None => Ok(Vec::new()),
		}
	}

	/// Reverses the most recent `add(key, offset)`. A no-op if `offset`
	/// is not the tail of `key`'s value list (LIFO-only reversal).
	pub fn undo(&self, key: &[u8], offset: i64) -> Result<()> {
		if key.is_empty() {
			return Ok(());
		}
		let stripe = self.stripe(key);
		let _guard = self.locks[stripe].lock();

		if let Some(value) = self.db.get(key)? {
			let mut value = value.to_vec();
			let tail = offset.to_be_bytes();
			if value.len() >= 8 && value[value.len() - 8..] == tail {
				value.truncate(value.len() - 8);
				if value.is_empty() {
					self.db.remove(key)?;
				} else {
					self.db.insert(key, value)?;
				}
				log::trace!(target: "collie-db", "index undo key-stripe {} offset {}", stripe, offset);
			}
		}
		Ok(())
	}

	/// Flushes pending writes to disk without closing the index.
	pub fn flush(&self) -> Result<()> {
		self.db.flush()?;
		Ok(())
	}

	pub fn close(&self) -> Result<()> {
		self.flush()
	}
}
