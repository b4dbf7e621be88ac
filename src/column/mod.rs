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

mod fixed;
mod variable;

pub use fixed::FixedColumn;
pub use variable::VariableColumn;

use std::fs::File;
use std::os::unix::fs::FileExt;

use crate::error::{Error, Result};

/// Common interface of a durable, append-only column stream addressed by
/// ordinal offset. Implemented by [`FixedColumn`] and [`VariableColumn`].
pub trait ColumnStream {
	/// Appends a value, returning its assigned offset.
	fn add(&self, value: &[u8]) -> Result<()>;
	/// Reads the value stored at `offset`.
	fn get(&self, offset: i64) -> Result<Vec<u8>>;
	/// Number of rows committed so far.
	fn len(&self) -> i64;
	/// Shrinks the stream so that only the first `rows` rows remain.
	fn truncate(&self, rows: i64) -> Result<()>;
	/// Flushes any buffered writes to the filesystem.
	fn sync(&self) -> Result<()>;
	/// Closes the underlying file(s). Idempotent; the actual descriptors
	/// are released on `Drop` regardless, matching the teacher lineage's
	/// resource-ownership model where `Close` is safe to call more than
	/// once.
	fn close(&self) -> Result<()> {
		Ok(())
	}
}

pub(crate) fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
	let mut read = 0;
	while read < buf.len() {
		match file.read_at(&mut buf[read..], offset + read as u64) {
			Ok(0) => {
				return Err(std::io::Error::new(
					std::io::ErrorKind::UnexpectedEof,
					"short read from column stream",
				))
			}
			Ok(n) => read += n,
			Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
			Err(e) => return Err(e),
		}
	}
	Ok(())
}

/// Maps a raw I/O error arising from a positional read into
/// [`Error::NotFound`] when it looks like an out-of-range access, and
/// passes through anything else verbatim.
pub(crate) fn not_found_on_short_read(err: std::io::Error) -> Error {
	if crate::error::is_not_found(&err) {
		Error::NotFound
	} else {
		Error::Io(err)
	}
}
