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

/// The closed set of error kinds an index operation may surface.
///
/// `NotFound`, `Duplicate` and `NeedsResize` are expected, non-fatal
/// outcomes a caller may handle inline; everything else indicates a real
/// failure.
#[derive(Debug)]
pub enum Error {
	/// Lookup of an absent key (or an empty VA slot).
	NotFound,
	/// Insert of a key already present.
	Duplicate,
	/// SS insert attempted with fewer than two vacant slots remaining.
	Full,
	/// Advisory: SS load has crossed the resize threshold.
	NeedsResize,
	/// Malformed key string (VA decimal parse failure, wrong length, ...).
	BadArg(String),
	/// Key-list failed to parse against the key-list grammar.
	BadList(String),
	/// Cache or buffer growth failed.
	BadAlloc,
	/// Any file operation failure.
	Io(std::io::Error),
	/// SS header checksum did not match its recomputed CRC.
	WrongFile,
	/// Record-fill ran out of buffer space; partial record was rolled back.
	BufferOverflow,
	/// Operation attempted on a handle that is not open.
	NotOpen,
	/// `Create` attempted against a path that already exists / is open.
	AlreadyOpen,
	/// Mutating operation attempted against a `ReadOnly` handle.
	ReadOnlyViolation,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::NotFound => write!(f, "key not found"),
			Error::Duplicate => write!(f, "key already present"),
			Error::Full => write!(f, "index is full (fewer than two vacant slots)"),
			Error::NeedsResize => write!(f, "index load has crossed the resize threshold"),
			Error::BadArg(msg) => write!(f, "bad argument: {}", msg),
			Error::BadList(msg) => write!(f, "bad key-list: {}", msg),
			Error::BadAlloc => write!(f, "allocation failure"),
			Error::Io(e) => write!(f, "io error: {}", e),
			Error::WrongFile => write!(f, "header checksum mismatch"),
			Error::BufferOverflow => write!(f, "record buffer overflow"),
			Error::NotOpen => write!(f, "index handle is not open"),
			Error::AlreadyOpen => write!(f, "index file already exists / is open"),
			Error::ReadOnlyViolation => write!(f, "mutating operation on a read-only handle"),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Error {
		Error::Io(e)
	}
}

impl PartialEq for Error {
	fn eq(&self, other: &Error) -> bool {
		use Error::*;
		match (self, other) {
			(NotFound, NotFound)
			| (Duplicate, Duplicate)
			| (Full, Full)
			| (NeedsResize, NeedsResize)
			| (BadAlloc, BadAlloc)
			| (WrongFile, WrongFile)
			| (BufferOverflow, BufferOverflow)
			| (NotOpen, NotOpen)
			| (AlreadyOpen, AlreadyOpen)
			| (ReadOnlyViolation, ReadOnlyViolation) => true,
			(BadArg(a), BadArg(b)) => a == b,
			(BadList(a), BadList(b)) => a == b,
			(Io(a), Io(b)) => a.kind() == b.kind(),
			_ => false,
		}
	}
}
