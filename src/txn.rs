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
use std::sync::atomic::Ordering;

use crate::collection::Collection;
use crate::error::{Error, Result};

/// A value produced or consumed by record callbacks.
pub type Value = Vec<u8>;

/// Anything that can, on demand, produce the byte payload for a data
/// column and the list of index keys for an indexed column, by name.
/// The collection never reflects on the concrete type; it only calls
/// back through this trait.
pub trait Record {
	/// Returns the data payload for column `name`, or `None` to store an
	/// empty value.
	fn value(&self, name: &str) -> Result<Option<Value>>;
	/// Returns the index keys this record produces for indexed column
	/// `name` (zero, one, or many).
	fn index_values(&self, name: &str) -> Result<Vec<Value>>;
}

/// A simple, map-backed [`Record`] used for ad-hoc staging via
/// [`Txn::new_row`].
#[derive(Default)]
pub struct Row {
	columns: HashMap<String, Value>,
	indices: HashMap<String, Vec<Value>>,
}

impl Row {
	pub(crate) fn with_capacity(columns: usize, indices: usize) -> Row {
		Row { columns: HashMap::with_capacity(columns), indices: HashMap::with_capacity(indices) }
	}

	/// Sets (overwriting) the value stored for data column `name`.
	pub fn set_column(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
		self.columns.insert(name.into(), value);
		self
	}

	/// Appends an index key for indexed column `name`.
	pub fn add_index(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
		self.indices.entry(name.into()).or_default().push(value);
		self
	}
}

impl Record for Row {
	fn value(&self, name: &str) -> Result<Option<Value>> {
		Ok(self.columns.get(name).cloned())
	}

	fn index_values(&self, name: &str) -> Result<Vec<Value>> {
		Ok(self.indices.get(name).cloned().unwrap_or_default())
	}
}

enum Staged {
	Boxed(Box<dyn Record>),
	Row(Row),
}

impl Staged {
	fn value(&self, name: &str) -> Result<Option<Value>> {
		match self {
			Staged::Boxed(r) => r.value(name),
			Staged::Row(r) => r.value(name),
		}
	}

	fn index_values(&self, name: &str) -> Result<Vec<Value>> {
		match self {
			Staged::Boxed(r) => r.index_values(name),
			Staged::Row(r) => r.index_values(name),
		}
	}
}

struct IndexUpdate {
	index: String,
	key: Value,
	offset: i64,
}

/// A batch of staged records bound to a [`Collection`]. Transactions are
/// transient (never persisted) and are not safe for concurrent use by
/// multiple threads.
pub struct Txn<'a> {
	collection: &'a Collection,
	stash: Vec<Staged>,
}

impl<'a> Txn<'a> {
	pub(crate) fn new(collection: &'a Collection, hint: usize) -> Txn<'a> {
		Txn { collection, stash: Vec::with_capacity(hint) }
	}

	#[cfg(test)]
	pub(crate) fn stash_capacity(&self) -> usize {
		self.stash.capacity()
	}

	/// Stages an arbitrary [`Record`] for the next commit.
	pub fn add(&mut self, record: Box<dyn Record>) {
		self.stash.push(Staged::Boxed(record));
	}

	/// Stages a freshly-constructed, empty [`Row`] and returns a handle
	/// for field population.
	pub fn new_row(&mut self) -> &mut Row {
		let row = Row::with_capacity(self.collection.columns.len(), self.collection.indices.len());
		self.stash.push(Staged::Row(row));
		match self.stash.last_mut() {
			Some(Staged::Row(row)) => row,
			_ => unreachable!(),
		}
	}

	/// Clears the stash without touching durable state.
	pub fn discard(&mut self) {
		self.stash.clear();
	}

	/// Commits the staged batch atomically. Returns the pre-commit
	/// offset (the offset of the first staged record) and, on failure,
	/// the error that triggered rollback. If `CollectionOptions::sync`
	/// is set, every touched column and index is flushed to disk before
	/// this returns; a flush failure is reported the same way but does
	/// not roll back the already-applied batch.
	pub fn commit(&mut self) -> (i64, Option<Error>) {
		let _guard = self.collection.wmux.lock();

		let current = self.collection.logical_offset.load(Ordering::Acquire);
		let mut offset = current;
		let mut undo_log: Vec<IndexUpdate> =
			Vec::with_capacity(self.collection.indices.len() * self.stash.len() * 2);

		for record in &self.stash {
			if let Err(err) = self.apply_record(record, offset, &mut undo_log) {
				self.rollback(current, &undo_log);
				log::debug!(target: "collie-db", "commit rolled back at offset {}: {}", current, err);
				return (current, Some(err));
			}
			offset += 1;
		}

		self.collection.logical_offset.store(offset, Ordering::Release);
		log::debug!(target: "collie-db", "committed {} records from offset {}", self.stash.len(), current);

		if self.collection.options.sync {
			if let Err(err) = self.sync_touched(&undo_log) {
				log::error!(target: "collie-db", "sync after commit failed: {}", err);
				return (current, Some(err));
			}
		}

		(current, None)
	}

	/// Flushes every column stream and every index that received a write
	/// during this commit, in that order, before the write mutex is
	/// released by the caller.
	fn sync_touched(&self, undo_log: &[IndexUpdate]) -> Result<()> {
		for col in self.collection.columns.values() {
			col.sync()?;
		}

		let mut synced = std::collections::HashSet::new();
		for update in undo_log {
			if synced.insert(update.index.as_str()) {
				if let Some(index) = self.collection.indices.get(&update.index) {
					index.flush()?;
				}
			}
		}
		Ok(())
	}

	fn apply_record(&self, record: &Staged, offset: i64, undo_log: &mut Vec<IndexUpdate>) -> Result<()> {
		for (name, col) in &self.collection.columns {
			let value = record.value(name)?.unwrap_or_default();
			col.add(&value)?;
		}

		for (name, index) in &self.collection.indices {
			for key in record.index_values(name)? {
				index.add(&key, offset)?;
				undo_log.push(IndexUpdate { index: name.clone(), key, offset });
			}
		}

		Ok(())
	}

	fn rollback(&self, current_offset: i64, undo_log: &[IndexUpdate]) {
		for col in self.collection.columns.values() {
			if let Err(err) = col.truncate(current_offset) {
				log::error!(target: "collie-db", "rollback truncate failed: {}", err);
			}
		}

		for update in undo_log.iter().rev() {
			if let Some(index) = self.collection.indices.get(&update.index) {
				if let Err(err) = index.undo(&update.key, update.offset) {
					log::error!(target: "collie-db", "rollback undo failed: {}", err);
				}
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::schema::{ColumnSpec, Schema};

	struct TempDir(std::path::PathBuf);

	impl TempDir {
		fn new(name: &'static str) -> TempDir {
			env_logger::try_init().ok();
			let mut path = std::env::temp_dir();
			path.push("collie-db-test");
			path.push("txn");
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

	fn schema() -> Schema {
		Schema::create(vec![
			ColumnSpec::new("first"),
			ColumnSpec::new("last").with_size(40),
			ColumnSpec::new("cityID").with_size(4).with_indexed(true).with_no_data(true),
			ColumnSpec::new("age").with_size(1).with_indexed(true),
			ColumnSpec::new("active").with_size(1),
		])
	}

	struct MapRecord(HashMap<&'static str, Value>);

	impl Record for MapRecord {
		fn value(&self, name: &str) -> Result<Option<Value>> {
			Ok(self.0.get(name).cloned())
		}
		fn index_values(&self, name: &str) -> Result<Vec<Value>> {
			Ok(self.0.get(name).cloned().into_iter().collect())
		}
	}

	fn rec(fields: &[(&'static str, &[u8])]) -> Box<dyn Record> {
		Box::new(MapRecord(fields.iter().map(|(k, v)| (*k, v.to_vec())).collect()))
	}

	struct BadColRecord;

	impl Record for BadColRecord {
		fn value(&self, _name: &str) -> Result<Option<Value>> {
			Err(Error::Io(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "boom")))
		}
		fn index_values(&self, _name: &str) -> Result<Vec<Value>> {
			Ok(Vec::new())
		}
	}

	struct BadIndexRecord(HashMap<&'static str, Value>);

	impl Record for BadIndexRecord {
		fn value(&self, name: &str) -> Result<Option<Value>> {
			Ok(self.0.get(name).cloned())
		}
		fn index_values(&self, name: &str) -> Result<Vec<Value>> {
			if name == "age" {
				return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "boom")));
			}
			Ok(self.0.get(name).cloned().into_iter().collect())
		}
	}

	fn seeded_stash(txn: &mut Txn) {
		txn.add(rec(&[
			("first", b"Jane"),
			("last", b"Doe"),
			("age", &[27]),
			("cityID", &[0, 0, 2, 0]),
			("active", &[1]),
		]));
		txn.add(rec(&[("first", b"John"), ("last", b"Doe"), ("age", &[26]), ("cityID", &[0, 0, 2, 99])]));
	}

	#[test]
	fn adds_records() {
		let dir = TempDir::new("add_records");
		let schema = schema();
		let coll = Collection::open(&dir.0, &schema).unwrap();
		let mut txn = coll.begin(0);
		seeded_stash(&mut txn);

		let (offset, err) = txn.commit();
		assert_eq!(offset, 0);
		assert!(err.is_none());
		assert_eq!(coll.offset(), 2);
	}

	#[test]
	fn commits_with_sync_enabled_flush_without_error() {
		use crate::options::CollectionOptions;

		let dir = TempDir::new("sync_commit");
		let schema = schema();
		let options = CollectionOptions::new().with_sync(true);
		let coll = Collection::open_with(&dir.0, &schema, options).unwrap();

		let mut txn = coll.begin(0);
		seeded_stash(&mut txn);

		let (offset, err) = txn.commit();
		assert_eq!(offset, 0);
		assert!(err.is_none());
		assert_eq!(coll.offset(), 2);
	}

	#[test]
	fn adds_new_rows_via_row_handle() {
		let dir = TempDir::new("new_row");
		let schema = schema();
		let coll = Collection::open(&dir.0, &schema).unwrap();
		let mut txn = coll.begin(0);
		seeded_stash(&mut txn);

		{
			let row = txn.new_row();
			row.set_column("first", b"Jill".to_vec());
			row.set_column("age", vec![25]);
			row.add_index("cityID", vec![0, 0, 3, 0]);
			row.add_index("cityID", vec![0, 0, 3, 1]);
			row.add_index("age", vec![25]);
		}

		let (offset, err) = txn.commit();
		assert_eq!(offset, 0);
		assert!(err.is_none());
		assert_eq!(coll.offset(), 3);

		assert_eq!(coll.offsets("cityID", &[0, 0, 3, 0]).unwrap(), vec![2]);
		assert_eq!(coll.offsets("cityID", &[0, 0, 3, 1]).unwrap(), vec![2]);
		assert!(coll.offsets("cityID", &[0, 0, 3, 2]).unwrap().is_empty());
	}

	#[test]
	fn rolls_back_all_changes_on_column_error() {
		let dir = TempDir::new("rollback_col");
		let schema = schema();
		let coll = Collection::open(&dir.0, &schema).unwrap();
		let mut txn = coll.begin(0);
		txn.add(Box::new(BadColRecord));

		let (offset, err) = txn.commit();
		assert_eq!(offset, 0);
		assert!(err.is_some());
		assert_eq!(coll.offset(), 0);
		assert!(matches!(coll.value("first", 0), Err(Error::NotFound)));
	}

	#[test]
	fn rolls_back_to_previous_offset() {
		let dir = TempDir::new("rollback_offset");
		let schema = schema();
		let coll = Collection::open(&dir.0, &schema).unwrap();

		{
			let mut txn = coll.begin(0);
			seeded_stash(&mut txn);
			let (offset, err) = txn.commit();
			assert_eq!(offset, 0);
			assert!(err.is_none());
		}

		let mut txn = coll.begin(0);
		txn.add(Box::new(BadColRecord));
		let (offset, err) = txn.commit();
		assert_eq!(offset, 2);
		assert!(err.is_some());
		assert_eq!(coll.offset(), 2);
	}

	#[test]
	fn undoes_indices_on_failure() {
		let dir = TempDir::new("rollback_index");
		let schema = schema();
		let coll = Collection::open(&dir.0, &schema).unwrap();

		{
			let mut txn = coll.begin(0);
			seeded_stash(&mut txn);
			let (offset, err) = txn.commit();
			assert_eq!(offset, 0);
			assert!(err.is_none());
		}

		let mut txn = coll.begin(0);
		let mut bad = HashMap::new();
		bad.insert("age", vec![25]);
		bad.insert("cityID", vec![0, 0, 3, 0]);
		txn.add(Box::new(BadIndexRecord(bad)));
		let (offset, err) = txn.commit();
		assert_eq!(offset, 2);
		assert!(err.is_some());

		assert!(coll.offsets("age", &[25]).unwrap().is_empty());
		assert!(coll.offsets("cityID", &[0, 0, 3, 0]).unwrap().is_empty());
	}
}
