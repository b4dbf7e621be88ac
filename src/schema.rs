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

use std::collections::HashSet;

use crate::error::{Error, Result};

/// An abstract column definition of a schema.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
	/// Column name. Must start with a letter, followed by alphanumeric
	/// characters and underscores.
	pub name: String,
	/// Row size in bytes. `0` means variable length.
	pub size: u32,
	/// Whether this column should have a secondary hash index.
	pub indexed: bool,
	/// When true, no column stream is created: only the index (if any)
	/// is maintained.
	pub no_data: bool,
}

impl ColumnSpec {
	pub fn new(name: impl Into<String>) -> Self {
		ColumnSpec { name: name.into(), size: 0, indexed: false, no_data: false }
	}

	pub fn with_size(mut self, size: u32) -> Self {
		self.size = size;
		self
	}

	pub fn with_indexed(mut self, indexed: bool) -> Self {
		self.indexed = indexed;
		self
	}

	pub fn with_no_data(mut self, no_data: bool) -> Self {
		self.no_data = no_data;
		self
	}

	pub fn validate(&self) -> Result<()> {
		if !is_valid_column_name(&self.name) {
			return Err(Error::Schema(format!("invalid column name '{}'", self.name)));
		}
		Ok(())
	}
}

fn is_valid_column_name(name: &str) -> bool {
	let mut chars = name.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An ordered, validated sequence of column specs.
#[derive(Debug, Clone)]
pub struct Schema {
	columns: Vec<ColumnSpec>,
}

impl Schema {
	/// Validates `columns` and builds a new schema, or returns the first
	/// validation error encountered.
	pub fn new(columns: Vec<ColumnSpec>) -> Result<Schema> {
		let mut known = HashSet::with_capacity(columns.len());
		for col in &columns {
			col.validate()?;
			if !known.insert(col.name.clone()) {
				return Err(Error::Schema(format!("duplicate column '{}'", col.name)));
			}
			if col.no_data && !col.indexed {
				log::warn!(target: "collie-db", "column '{}' has no_data set without indexed; it stores nothing", col.name);
			}
		}
		Ok(Schema { columns })
	}

	/// Like [`Schema::new`], but panics on a validation error.
	pub fn create(columns: Vec<ColumnSpec>) -> Schema {
		match Schema::new(columns) {
			Ok(schema) => schema,
			Err(err) => panic!("{}", err),
		}
	}

	pub fn columns(&self) -> &[ColumnSpec] {
		&self.columns
	}
}
