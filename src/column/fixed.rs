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
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use super::{not_found_on_short_read, read_exact_at, ColumnStream};
use crate::error::{Error, Result};

/// A fixed-length column: every row occupies exactly `size` bytes.
pub struct FixedColumn {
	file: File,
	size: u32,
	rows: AtomicI64,
}

impl FixedColumn {
	/// Opens (creating if necessary) a fixed column file of `size`-byte
	/// rows, deriving the row count from the current file size.
	pub fn open(path: &Path, size: u32) -> Result<FixedColumn> {
		let file = OpenOptions::new().create(true).read(true).append(true).open(path)?;
		let len = file.metadata()?.len();
		let rows = (len / size as u64) as i64;
		log::debug!(target: "collie-db", "opened fixed column {:?} with {} rows", path, rows);
		Ok(FixedColumn { file, size, rows: AtomicI64::new(rows) })
	}
}

impl ColumnStream for FixedColumn {
	fn add(&self, value: &[u8]) -> Result<()> {
		let size = self.size as usize;
		let mut buf = vec![0u8; size];
		let n = value.len().min(size);
		buf[..n].copy_from_slice(&value[..n]);

		(&self.file).write_all(&buf)?;
		self.rows.fetch_add(1, Ordering::AcqRel);
		log::trace!(target: "collie-db", "fixed column add at row {}", self.rows.load(Ordering::Acquire) - 1);
		Ok(())
	}

	fn get(&self, offset: i64) -> Result<Vec<u8>> {
		if offset < 0 {
			return Err(Error::NotFound);
		}
		let size = self.size as usize;
		let mut buf = vec![0u8; size];
		read_exact_at(&self.file, &mut buf, offset as u64 * self.size as u64)
			.map_err(not_found_on_short_read)?;
		Ok(buf)
	}

	fn len(&self) -> i64 {
		self.rows.load(Ordering::Acquire)
	}

	fn truncate(&self, rows: i64) -> Result<()> {
		self.file.set_len(rows as u64 * self.size as u64)?;
		self.rows.store(rows, Ordering::Release);
		Ok(())
	}

	fn sync(&self) -> Result<()> {
		self.file.sync_data()?;
		Ok(())
	}
}
