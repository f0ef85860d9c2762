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

//! Generic index contract: a single `IndexHandle` type that dispatches
//! `Create`/`Open`/`Close`/`Insert`/`Delete`/`Find`/`GetSize`/`GetLoad`/
//! `Resize`/`ProcessAll` to whichever backend it was built with, without
//! the caller needing to match on which one.

use std::path::Path;

use crate::error::{Error, Result};
use crate::options::{self, Mode, Options};
use crate::ss::SsState;
use crate::va::VaState;

enum Backend {
	Va(VaState),
	Ss(SsState),
}

/// A single key/offset pairing, as produced by `ProcessAll`.
pub struct Entry {
	pub key: Vec<u8>,
	pub offset: u64,
}

/// An open index, backed by either the Virtual Array or Scatter Storage
/// implementation. Operations mean the same thing regardless of backend;
/// only their performance characteristics differ.
pub struct IndexHandle {
	backend: Backend,
	mode: Mode,
	key_size: u16,
}

impl IndexHandle {
	/// `Create(path, options)`.
	pub fn create(path: &Path, options: &Options) -> Result<IndexHandle> {
		let backend = match options.backend {
			options::Backend::Va => Backend::Va(VaState::create(path, options)?),
			options::Backend::Ss => Backend::Ss(SsState::create(path, options)?),
		};
		Ok(IndexHandle { backend, mode: Mode::ReadWrite, key_size: options.key_size })
	}

	/// `Open(path, mode, options)`. `options.backend` must match the
	/// backend the file was created with; mismatches surface as
	/// `Error::WrongFile` once the header fails to parse sensibly for SS,
	/// or produce nonsensical VA/SS state otherwise, since neither header
	/// format carries an explicit backend tag. Callers are expected to
	/// know which backend a path holds, the same way the original driver
	/// took a `-m` mode flag per invocation.
	pub fn open(path: &Path, mode: Mode, options: &Options) -> Result<IndexHandle> {
		let backend = match options.backend {
			options::Backend::Va => Backend::Va(VaState::open(path, mode, options.va_cache_size)?),
			options::Backend::Ss => Backend::Ss(SsState::open(path, mode, options)?),
		};
		// SS carries its own keySize on disk; prefer it over the
		// caller-supplied options in case the two ever disagree.
		let key_size = match &backend {
			Backend::Va(_) => options.key_size,
			Backend::Ss(ss) => ss.key_size(),
		};
		Ok(IndexHandle { backend, mode, key_size })
	}

	pub fn close(self) -> Result<()> {
		match self.backend {
			Backend::Va(va) => va.close(),
			Backend::Ss(ss) => ss.close(),
		}
	}

	/// Keys are accepted as bytes uniformly; VA additionally requires the
	/// bytes to parse as an unsigned decimal string, matching the
	/// numeric nature of its direct addressing.
	pub fn insert(&mut self, key: &[u8], offset: u64) -> Result<()> {
		match &mut self.backend {
			Backend::Va(va) => va.insert(&Self::key_str(key)?, offset),
			Backend::Ss(ss) => ss.insert(key, offset),
		}
	}

	pub fn delete(&mut self, key: &[u8]) -> Result<()> {
		match &mut self.backend {
			Backend::Va(va) => va.delete(&Self::key_str(key)?),
			Backend::Ss(ss) => ss.delete(key),
		}
	}

	pub fn find(&self, key: &[u8]) -> Result<u64> {
		match &self.backend {
			Backend::Va(va) => va.find(&Self::key_str(key)?),
			Backend::Ss(ss) => ss.find(key),
		}
	}

	pub fn size(&self) -> (u64, u64) {
		match &self.backend {
			Backend::Va(va) => va.size(),
			Backend::Ss(ss) => ss.size(),
		}
	}

	pub fn load_percent(&self) -> u8 {
		match &self.backend {
			Backend::Va(va) => va.load_percent(),
			Backend::Ss(ss) => ss.load_percent(),
		}
	}

	/// `NeedsResize`: VA never needs resizing (it grows lazily on
	/// insert); only SS has a fixed table that can fill up.
	pub fn needs_resize(&self) -> bool {
		match &self.backend {
			Backend::Va(_) => false,
			Backend::Ss(ss) => ss.needs_resize(),
		}
	}

	pub fn resize(&mut self, percent: u32) -> Result<()> {
		match &mut self.backend {
			Backend::Va(_) => Ok(()),
			Backend::Ss(ss) => ss.resize(percent),
		}
	}

	pub fn process_all(&self, mut visitor: impl FnMut(Entry) -> bool) -> Result<()> {
		match &self.backend {
			Backend::Va(va) => va.process_all(|k, offset| visitor(Entry { key: k.to_string().into_bytes(), offset })),
			Backend::Ss(ss) => ss.process_all(|k, offset| visitor(Entry { key: k.to_vec(), offset })),
		}
	}

	pub fn path(&self) -> &Path {
		match &self.backend {
			Backend::Va(va) => va.path(),
			Backend::Ss(ss) => ss.path(),
		}
	}

	pub fn mode(&self) -> Mode {
		self.mode
	}

	pub fn key_size(&self) -> u16 {
		self.key_size
	}

	fn key_str(key: &[u8]) -> Result<String> {
		std::str::from_utf8(key)
			.map(|s| s.to_string())
			.map_err(|_| Error::BadArg("VA keys must be ASCII decimal strings".to_string()))
	}
}
