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

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;

use super::{not_found_on_short_read, read_exact_at, ColumnStream};
use crate::error::{Error, Result};

struct WriteState {
	payload: File,
	index: File,
	rows: i64,
	pos: i64,
}

/// A variable-length column: a payload file of concatenated values plus a
/// companion index of 8-byte big-endian cumulative end-positions.
pub struct VariableColumn {
	rows: AtomicI64,
	state: Mutex<WriteState>,
	// Independent read handles so that `get` never has to take `state`'s
	// mutex: positional reads are lock-free, bounded only by the atomic
	// `rows` snapshot, matching the fixed column's read path.
	payload_ro: File,
	index_ro: File,
}

fn index_path(fname: &Path) -> PathBuf {
	let mut p = fname.as_os_str().to_owned();
	p.push(".index");
	PathBuf::from(p)
}

fn read_end(index: &File, i: i64) -> Result<i64> {
	let mut buf = [0u8; 8];
	read_exact_at(index, &mut buf, i as u64 * 8).map_err(not_found_on_short_read)?;
	Ok(i64::from_be_bytes(buf))
}

impl VariableColumn {
	/// Opens (creating if necessary) the payload/index file pair at
	/// `fname`/`fname.index`.
	pub fn open(fname: &Path) -> Result<VariableColumn> {
		let index = OpenOptions::new().create(true).read(true).write(true).open(index_path(fname))?;
		let index_len = index.metadata()?.len();
		let rows = (index_len / 8) as i64;

		let payload = OpenOptions::new().create(true).read(true).write(true).open(fname)?;

		let pos = if rows > 0 { read_end(&index, rows - 1)? } else { 0 };

		let payload_ro = payload.try_clone()?;
		let index_ro = index.try_clone()?;

		log::debug!(target: "collie-db", "opened variable column {:?} with {} rows", fname, rows);
		Ok(VariableColumn {
			rows: AtomicI64::new(rows),
			state: Mutex::new(WriteState { payload, index, rows, pos }),
			payload_ro,
			index_ro,
		})
	}
}

impl ColumnStream for VariableColumn {
	fn add(&self, value: &[u8]) -> Result<()> {
		let mut state = self.state.lock();
		let row = state.rows;
		let new_pos = state.pos + value.len() as i64;

		// Payload is written at the explicit cursor position (not a
		// plain append): after a `Truncate`, `pos` sits behind the
		// file's actual end, and the next `Add` must overwrite that
		// orphaned tail rather than grow past it.
		state.payload.write_at(value, state.pos as u64)?;
		state.index.write_at(&new_pos.to_be_bytes(), row as u64 * 8)?;

		state.pos = new_pos;
		state.rows = row + 1;
		self.rows.store(state.rows, Ordering::Release);
		log::trace!(target: "collie-db", "variable column add at row {}", row);
		Ok(())
	}

	fn get(&self, offset: i64) -> Result<Vec<u8>> {
		if offset < 0 {
			return Err(Error::NotFound);
		}
		let max = read_end(&self.index_ro, offset)?;
		let min = if offset > 0 { read_end(&self.index_ro, offset - 1)? } else { 0 };

		// A short read here is an I/O error, not NotFound: the index
		// already vouched for this range existing.
		let mut buf = vec![0u8; (max - min) as usize];
		read_exact_at(&self.payload_ro, &mut buf, min as u64)?;
		Ok(buf)
	}

	fn len(&self) -> i64 {
		self.rows.load(Ordering::Acquire)
	}

	fn truncate(&self, rows: i64) -> Result<()> {
		let mut state = self.state.lock();
		let pos = if rows > 0 { read_end(&state.index, rows - 1)? } else { 0 };

		state.index.set_len(rows as u64 * 8)?;
		state.rows = rows;
		state.pos = pos;
		self.rows.store(rows, Ordering::Release);
		Ok(())
	}

	fn sync(&self) -> Result<()> {
		let state = self.state.lock();
		state.payload.sync_data()?;
		state.index.sync_data()?;
		Ok(())
	}
}
