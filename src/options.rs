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

//! Index creation/open configuration.

/// Which on-disk backend a handle is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
	/// Direct-addressed array.
	Va,
	/// Open-addressed double-hashed table.
	Ss,
}

/// Primary hash function selected for an SS index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFunction {
	/// Peter J. Weinberger's compiler-style hash. Default.
	Pjw,
	/// Shift-and-add running sum.
	Add,
	/// First byte + last byte + length.
	Fll,
}

impl Default for HashFunction {
	fn default() -> Self {
		HashFunction::Pjw
	}
}

/// Read/write mode of an opened handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	ReadOnly,
	ReadWrite,
}

/// Options governing `Create`/`Open` of an index handle.
#[derive(Debug, Clone)]
pub struct Options {
	pub backend: Backend,
	/// Fixed key length in bytes for this index instance.
	pub key_size: u16,
	/// SS: requested initial slot capacity before twin-prime rounding.
	/// VA: ignored (VA grows lazily to the highest inserted key).
	pub initial_capacity: u64,
	/// SS only.
	pub hash_function: HashFunction,
	/// VA slot-cache capacity (`B`).
	pub va_cache_size: u16,
	/// SS load fraction (percent) at which `GetLoad` signals `NeedsResize`.
	pub resize_threshold_percent: u8,
	/// VA empty-slot fill byte (applies to non-default `elemSize`
	/// records only; the default 8-byte offset record always uses the
	/// `u64::MAX` sentinel regardless of this byte).
	pub fill_byte: u8,
}

pub const DEFAULT_VA_CACHE_SIZE: u16 = 100;
pub const DEFAULT_RESIZE_THRESHOLD_PERCENT: u8 = 80;

impl Default for Options {
	fn default() -> Self {
		Options {
			backend: Backend::Ss,
			key_size: 5,
			initial_capacity: 100,
			hash_function: HashFunction::default(),
			va_cache_size: DEFAULT_VA_CACHE_SIZE,
			resize_threshold_percent: DEFAULT_RESIZE_THRESHOLD_PERCENT,
			fill_byte: b' ',
		}
	}
}

impl Options {
	pub fn new(backend: Backend, key_size: u16) -> Options {
		Options { backend, key_size, ..Options::default() }
	}

	pub fn with_capacity(mut self, capacity: u64) -> Self {
		self.initial_capacity = capacity;
		self
	}

	pub fn with_hash_function(mut self, f: HashFunction) -> Self {
		self.hash_function = f;
		self
	}
}
