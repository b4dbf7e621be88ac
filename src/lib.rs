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

//! An append-only, column-oriented embedded store for records whose
//! schema is fixed at open time.
//!
//! Each column is persisted as an independent on-disk stream (fixed- or
//! variable-width), with optional secondary hash indices for selected
//! columns. Records are addressed by a monotonically assigned integer
//! offset; [`Collection::value`] reads `(column, offset)` and
//! [`Collection::offsets`] resolves an indexed value back to the set of
//! offsets that produced it. Batches of records are inserted
//! transactionally through [`Txn`], with all-or-nothing rollback across
//! every column and index touched by the batch.
//!
//! This crate covers the storage core only: schema parsing from external
//! formats, network exposure, query planning and compaction are left to
//! callers.

pub mod column;
mod collection;
pub mod error;
mod index;
pub mod options;
pub mod schema;
mod txn;

pub use collection::Collection;
pub use error::{Error, Result};
pub use index::HashIndex;
pub use options::CollectionOptions;
pub use schema::{ColumnSpec, Schema};
pub use txn::{Record, Row, Txn, Value};
