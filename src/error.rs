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

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug)]
pub enum Error {
	/// A column or index was named that is not part of the schema.
	ColumnNotFound,
	/// The requested offset does not exist in the column.
	NotFound,
	/// A schema was rejected at construction time.
	Schema(String),
	/// A record callback (`value`/`index_values`) returned an error.
	Record(Box<dyn std::error::Error + Send + Sync>),
	/// An underlying filesystem or index-store error.
	Io(std::io::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::ColumnNotFound => write!(f, "collie-db: column not found"),
			Error::NotFound => write!(f, "collie-db: not found"),
			Error::Schema(msg) => write!(f, "collie-db: {}", msg),
			Error::Record(err) => write!(f, "collie-db: record error: {}", err),
			Error::Io(err) => write!(f, "collie-db: io error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Record(err) => Some(err.as_ref()),
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Error {
		Error::Io(err)
	}
}

impl From<sled::Error> for Error {
	fn from(err: sled::Error) -> Error {
		match err {
			sled::Error::Io(e) => Error::Io(e),
			other => Error::Io(std::io::Error::new(std::io::ErrorKind::Other, other.to_string())),
		}
	}
}

/// Returns `true` if `err` represents an "invalid position"/EOF style
/// failure that callers should surface as [`Error::NotFound`].
pub(crate) fn is_not_found(err: &std::io::Error) -> bool {
	use std::io::ErrorKind;
	matches!(err.kind(), ErrorKind::UnexpectedEof | ErrorKind::InvalidInput)
}
