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

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use fs2::FileExt;
use parking_lot::Mutex;

use crate::column::{ColumnStream, FixedColumn, VariableColumn};
use crate::error::{Error, Result};
use crate::index::HashIndex;
use crate::options::CollectionOptions;
use crate::schema::Schema;
use crate::txn::Txn;

/// Owner of a named set of column streams and indices, and of the single
/// logical row count ("offset") shared by all of them.
pub struct Collection {
	pub(crate) dir: PathBuf,
	pub(crate) columns: HashMap<String, Box<dyn ColumnStream + Send + Sync>>,
	pub(crate) indices: HashMap<String, HashIndex>,
	pub(crate) logical_offset: AtomicI64,
	pub(crate) wmux: Mutex<()>,
	pub(crate) options: CollectionOptions,
	// Held for the lifetime of the collection; released when this is
	// dropped. Guards against a second process opening the same
	// directory concurrently, which neither the column streams nor the
	// index has any protection against on its own.
	_lock: File,
}

impl Collection {
	/// Opens (creating if necessary) a collection at `dir` for `schema`,
	/// with default options.
	pub fn open(dir: impl AsRef<Path>, schema: &Schema) -> Result<Collection> {
		Collection::open_with(dir, schema, CollectionOptions::default())
	}

	/// Opens (creating if necessary) a collection at `dir` for `schema`,
	/// tuned by `options`.
	pub fn open_with(dir: impl AsRef<Path>, schema: &Schema, options: CollectionOptions) -> Result<Collection> {
		let dir = dir.as_ref().to_path_buf();
		std::fs::create_dir_all(&dir)?;

		let lock = OpenOptions::new().create(true).write(true).open(dir.join(".lock"))?;
		lock.try_lock_exclusive().map_err(|_| {
			Error::Io(std::io::Error::new(
				std::io::ErrorKind::WouldBlock,
				format!("collection at {:?} is already open in another process", dir),
			))
		})?;

		let mut columns: HashMap<String, Box<dyn ColumnStream + Send + Sync>> = HashMap::new();
		let mut indices: HashMap<String, HashIndex> = HashMap::new();

		for col in schema.columns() {
			let prefix = dir.join(&col.name);

			if col.indexed {
				let index = HashIndex::open(&prefix.with_extension("ci"), options.stripes)?;
				indices.insert(col.name.clone(), index);
			}

			if !col.no_data {
				let data_path = prefix.with_extension("cc");
				let stream: Box<dyn ColumnStream + Send + Sync> = if col.size > 0 {
					Box::new(FixedColumn::open(&data_path, col.size)?)
				} else {
					Box::new(VariableColumn::open(&data_path)?)
				};
				columns.insert(col.name.clone(), stream);
			}
		}

		let offset = columns.values().map(|c| c.len()).min().unwrap_or(0);
		for (name, col) in columns.iter() {
			if col.len() > offset {
				log::warn!(
					target: "collie-db",
					"column '{}' has {} rows, trimming to collection offset {}",
					name, col.len(), offset,
				);
				col.truncate(offset)?;
			}
		}

		log::debug!(target: "collie-db", "opened collection {:?} at offset {}", dir, offset);
		Ok(Collection {
			dir,
			columns,
			indices,
			logical_offset: AtomicI64::new(offset),
			wmux: Mutex::new(()),
			options,
			_lock: lock,
		})
	}

	/// The number of committed rows; also the next offset to be assigned.
	pub fn offset(&self) -> i64 {
		self.logical_offset.load(Ordering::Acquire)
	}

	/// Reads the value of column `name` at `offset`.
	pub fn value(&self, name: &str, offset: i64) -> Result<Vec<u8>> {
		let col = self.columns.get(name).ok_or(Error::ColumnNotFound)?;
		col.get(offset)
	}

	/// Returns the offsets recorded for `value` under the index on
	/// column `name`.
	pub fn offsets(&self, name: &str, value: &[u8]) -> Result<Vec<i64>> {
		let idx = self.indices.get(name).ok_or(Error::ColumnNotFound)?;
		idx.get(value)
	}

	/// Starts a new transaction, pre-sizing its staging buffer to `hint`.
	pub fn begin(&self, hint: usize) -> Txn<'_> {
		Txn::new(self, hint)
	}

	/// Starts a new transaction, pre-sizing its staging buffer to
	/// `options.stash_hint` rather than a caller-supplied hint.
	pub fn begin_default(&self) -> Txn<'_> {
		self.begin(self.options.stash_hint)
	}

	/// Closes every column stream and index, returning the last error
	/// encountered, if any.
	pub fn close(&self) -> Result<()> {
		let mut last_err = None;
		for col in self.columns.values() {
			if let Err(e) = col.close() {
				log::error!(target: "collie-db", "error closing column: {}", e);
				last_err = Some(e);
			}
		}
		for idx in self.indices.values() {
			if let Err(e) = idx.close() {
				log::error!(target: "collie-db", "error closing index: {}", e);
				last_err = Some(e);
			}
		}
		match last_err {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::schema::ColumnSpec;
	use crate::txn::Record;

	struct TempDir(std::path::PathBuf);

	impl TempDir {
		fn new(name: &'static str) -> TempDir {
			env_logger::try_init().ok();
			let mut path = std::env::temp_dir();
			path.push("collie-db-test");
			path.push("collection");
			path.push(name);
			if path.exists() {
				std::fs::remove_dir_all(&path).unwrap();
			}
			TempDir(path)
		}
	}

	impl Drop for TempDir {
		fn drop(&mut self) {
			if self.0.exists() {
				std::fs::remove_dir_all(&self.0).unwrap();
			}
		}
	}

	fn test_schema() -> Schema {
		Schema::create(vec![
			ColumnSpec::new("first"),
			ColumnSpec::new("last").with_size(40),
			ColumnSpec::new("accountIds").with_size(4).with_indexed(true).with_no_data(true),
			ColumnSpec::new("age").with_size(1).with_indexed(true),
			ColumnSpec::new("active").with_size(1),
		])
	}

	struct MapRecord(HashMap<&'static str, Vec<u8>>);

	impl Record for MapRecord {
		fn value(&self, name: &str) -> crate::error::Result<Option<Vec<u8>>> {
			Ok(self.0.get(name).cloned())
		}
		fn index_values(&self, name: &str) -> crate::error::Result<Vec<Vec<u8>>> {
			Ok(self.0.get(name).cloned().into_iter().collect())
		}
	}

	fn record(fields: &[(&'static str, &[u8])]) -> MapRecord {
		MapRecord(fields.iter().map(|(k, v)| (*k, v.to_vec())).collect())
	}

	#[test]
	fn begin_default_uses_the_configured_stash_hint() {
		let dir = TempDir::new("begin_default");
		let schema = test_schema();
		let options = CollectionOptions::new().with_stash_hint(5);
		let coll = Collection::open_with(&dir.0, &schema, options).unwrap();

		let txn = coll.begin_default();
		assert_eq!(txn.stash_capacity(), 5);
	}

	#[test]
	fn registers_columns_and_indices() {
		let dir = TempDir::new("register");
		let schema = test_schema();
		let coll = Collection::open(&dir.0, &schema).unwrap();

		assert_eq!(coll.columns.len(), 4);
		assert!(coll.columns.contains_key("first"));
		assert!(coll.columns.contains_key("last"));
		assert!(coll.columns.contains_key("age"));
		assert!(coll.columns.contains_key("active"));

		assert_eq!(coll.indices.len(), 2);
		assert!(coll.indices.contains_key("accountIds"));
		assert!(coll.indices.contains_key("age"));
	}

	fn seeded(dir: &TempDir) -> (Schema, Collection) {
		let schema = test_schema();
		let coll = Collection::open(&dir.0, &schema).unwrap();

		let mut txn = coll.begin(2);
		txn.add(Box::new(record(&[
			("first", b"Jane"),
			("last", b"Doe"),
			("age", &[27]),
			("accountIds", &[0, 0, 2, 0]),
			("active", &[1]),
		])));
		txn.add(Box::new(record(&[
			("first", b"John"),
			("last", b"Doe"),
			("age", &[26]),
			("accountIds", &[0, 0, 2, 99]),
		])));

		let (offset, err) = txn.commit();
		assert_eq!(offset, 0);
		assert!(err.is_none());

		(schema, coll)
	}

	#[test]
	fn adds_records() {
		let dir = TempDir::new("add_records");
		let (_schema, coll) = seeded(&dir);
		assert_eq!(coll.offset(), 2);
	}

	#[test]
	fn reopens_databases() {
		let dir = TempDir::new("reopen");
		let (schema, coll) = seeded(&dir);
		coll.close().unwrap();
		drop(coll);

		let coll = Collection::open(&dir.0, &schema).unwrap();
		assert_eq!(coll.offset(), 2);
	}

	#[test]
	fn gets_values_at_offset() {
		let dir = TempDir::new("get_values");
		let (_schema, coll) = seeded(&dir);

		assert_eq!(coll.value("first", 0).unwrap(), b"Jane");
		assert_eq!(coll.value("last", 1).unwrap()[..3], b"Doe"[..]);
		assert!(matches!(coll.value("last", 2), Err(Error::NotFound)));
		assert!(matches!(coll.value("lost", 1), Err(Error::ColumnNotFound)));
	}

	#[test]
	fn queries_index_offsets() {
		let dir = TempDir::new("query_offsets");
		let (_schema, coll) = seeded(&dir);

		assert_eq!(coll.offsets("age", &[26]).unwrap(), vec![1]);
		assert_eq!(coll.offsets("age", &[27]).unwrap(), vec![0]);
		assert!(coll.offsets("age", &[127]).unwrap().is_empty());
		assert!(coll.offsets("age", &[0, 0, 0, 26]).unwrap().is_empty());
		assert!(matches!(coll.offsets("first", b"Jane"), Err(Error::ColumnNotFound)));
	}
}
