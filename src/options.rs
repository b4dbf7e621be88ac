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

//! Open-time tuning knobs for a [`crate::Collection`]. Not persisted; these
//! only affect runtime behaviour of the process that opens the collection.

pub const DEFAULT_STRIPES: usize = 4096;

/// Options controlling a [`crate::Collection`]'s runtime behaviour.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
	/// Number of lock stripes used by each hash index. Trades memory
	/// for write contention on hot keys.
	pub stripes: usize,
	/// When true, `Commit` flushes every touched stream before releasing
	/// the write mutex. The core format makes no durability guarantee
	/// stronger than the filesystem's own ordering; this is an opt-in
	/// extra.
	pub sync: bool,
	/// Default stash capacity hint used by `Collection::begin` when the
	/// caller doesn't size the transaction explicitly.
	pub stash_hint: usize,
}

impl Default for CollectionOptions {
	fn default() -> Self {
		CollectionOptions { stripes: DEFAULT_STRIPES, sync: false, stash_hint: 0 }
	}
}

impl CollectionOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_stripes(mut self, stripes: usize) -> Self {
		self.stripes = stripes;
		self
	}

	pub fn with_sync(mut self, sync: bool) -> Self {
		self.sync = sync;
		self
	}

	pub fn with_stash_hint(mut self, hint: usize) -> Self {
		self.stash_hint = hint;
		self
	}
}
