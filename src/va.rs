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

// On-disk data layout for the Virtual Array backend.
//
// [ totalSlots: u64 | usedSlots: u64 | elemSize: u16 | fillByte: u8 | records[totalSlots] ]
//
// Each record is `elemSize` bytes. The default record is a single
// `offset: u64`; the empty-slot sentinel is `u64::MAX`.

use std::convert::TryInto;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::options::{Mode, Options};

pub const HEADER_SIZE: u64 = 8 + 8 + 2 + 1;
pub const DEFAULT_ELEM_SIZE: u16 = 8;
pub const EMPTY_SENTINEL: u64 = u64::MAX;

#[cfg(target_os = "macos")]
fn disable_read_ahead(file: &std::fs::File) -> Result<()> {
	use std::os::unix::io::AsRawFd;
	if unsafe { libc::fcntl(file.as_raw_fd(), libc::F_RDAHEAD, 0) } != 0 {
		Err(std::io::Error::last_os_error())?
	} else {
		Ok(())
	}
}

#[cfg(not(target_os = "macos"))]
fn disable_read_ahead(_file: &std::fs::File) -> Result<()> {
	Ok(())
}

#[cfg(unix)]
fn read_at(file: &std::fs::File, buf: &mut [u8], offset: u64) -> Result<()> {
	use std::os::unix::fs::FileExt;
	Ok(file.read_exact_at(buf, offset)?)
}

#[cfg(unix)]
fn write_at(file: &std::fs::File, buf: &[u8], offset: u64) -> Result<()> {
	use std::os::unix::fs::FileExt;
	Ok(file.write_all_at(buf, offset)?)
}

#[cfg(windows)]
fn read_at(file: &std::fs::File, buf: &mut [u8], offset: u64) -> Result<()> {
	use std::os::windows::fs::FileExt;
	let mut read = 0;
	while read < buf.len() {
		let n = file.seek_read(&mut buf[read..], offset + read as u64)?;
		if n == 0 {
			return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
		}
		read += n;
	}
	Ok(())
}

#[cfg(windows)]
fn write_at(file: &std::fs::File, buf: &[u8], offset: u64) -> Result<()> {
	use std::os::windows::fs::FileExt;
	file.seek_write(buf, offset)?;
	Ok(())
}

/// A single slot of the write-through cache: the key it currently holds
/// (`u64::MAX` if empty) and the raw record bytes.
struct CacheSlot {
	key: u64,
	record: Vec<u8>,
}

/// Direct-mapped, single-set cache of `B` slots, `slot = key mod B`.
struct Cache {
	slots: Vec<CacheSlot>,
	blank: Vec<u8>,
}

impl Cache {
	fn new(capacity: u16, elem_size: u16, blank: Vec<u8>) -> Cache {
		let mut slots = Vec::with_capacity(capacity as usize);
		for _ in 0..capacity {
			slots.push(CacheSlot { key: EMPTY_SENTINEL, record: vec![0u8; elem_size as usize] });
		}
		Cache { slots, blank }
	}

	fn index(&self, key: u64) -> usize {
		(key % self.slots.len() as u64) as usize
	}
}

/// In-core state of an open Virtual Array handle.
pub struct VaState {
	file: std::fs::File,
	path: PathBuf,
	elem_size: u16,
	fill_byte: u8,
	total_slots: u64,
	used_slots: u64,
	mode: Mode,
	cache: Mutex<Cache>,
}

fn blank_record(elem_size: u16, fill_byte: u8) -> Vec<u8> {
	if elem_size == DEFAULT_ELEM_SIZE {
		EMPTY_SENTINEL.to_le_bytes().to_vec()
	} else {
		vec![fill_byte; elem_size as usize]
	}
}

fn is_empty_record(record: &[u8]) -> bool {
	record.len() >= 8 && u64::from_le_bytes(record[0..8].try_into().unwrap()) == EMPTY_SENTINEL
}

fn write_header(file: &std::fs::File, total_slots: u64, used_slots: u64, elem_size: u16, fill_byte: u8) -> Result<()> {
	let mut header = [0u8; HEADER_SIZE as usize];
	header[0..8].copy_from_slice(&total_slots.to_le_bytes());
	header[8..16].copy_from_slice(&used_slots.to_le_bytes());
	header[16..18].copy_from_slice(&elem_size.to_le_bytes());
	header[18] = fill_byte;
	write_at(file, &header, 0)
}

impl VaState {
	/// `Create(path, elemSize, _)`.
	pub fn create(path: &Path, options: &Options) -> Result<VaState> {
		if path.exists() {
			return Err(Error::AlreadyOpen);
		}
		// This core only builds the default single-offset record.
		let elem_size = DEFAULT_ELEM_SIZE;
		let fill_byte = options.fill_byte;
		let file = std::fs::OpenOptions::new().create(true).read(true).write(true).open(path)?;
		disable_read_ahead(&file)?;
		write_header(&file, 0, 0, elem_size, fill_byte)?;
		log::debug!(target: "indexx", "VA created at {}", path.display());
		let blank = blank_record(elem_size, fill_byte);
		Ok(VaState {
			file,
			path: path.to_path_buf(),
			elem_size,
			fill_byte,
			total_slots: 0,
			used_slots: 0,
			mode: Mode::ReadWrite,
			cache: Mutex::new(Cache::new(options.va_cache_size, elem_size, blank)),
		})
	}

	/// `Open(path, mode)`.
	pub fn open(path: &Path, mode: Mode, cache_size: u16) -> Result<VaState> {
		let mut file = std::fs::OpenOptions::new()
			.read(true)
			.write(mode == Mode::ReadWrite)
			.open(path)?;
		disable_read_ahead(&file)?;
		let mut header = [0u8; HEADER_SIZE as usize];
		file.seek(SeekFrom::Start(0))?;
		file.read_exact(&mut header)?;
		let total_slots = u64::from_le_bytes(header[0..8].try_into().unwrap());
		let used_slots = u64::from_le_bytes(header[8..16].try_into().unwrap());
		let elem_size = u16::from_le_bytes(header[16..18].try_into().unwrap());
		let fill_byte = header[18];
		log::debug!(target: "indexx", "VA opened {}: total={} used={}", path.display(), total_slots, used_slots);
		let blank = blank_record(elem_size, fill_byte);
		Ok(VaState {
			file,
			path: path.to_path_buf(),
			elem_size,
			fill_byte,
			total_slots,
			used_slots,
			mode,
			cache: Mutex::new(Cache::new(cache_size, elem_size, blank)),
		})
	}

	/// On close, every occupied cache slot is flushed. Each slot write
	/// is already write-through (synchronous to disk), so there is
	/// nothing outstanding left to do here beyond dropping the handle.
	pub fn close(self) -> Result<()> {
		Ok(())
	}

	fn extend_to(&mut self, k: u64) -> Result<()> {
		if k < self.total_slots {
			return Ok(());
		}
		let cache = self.cache.lock();
		let new_total = k + 1;
		self.file.set_len(HEADER_SIZE + new_total * self.elem_size as u64)?;
		for slot in self.total_slots..new_total {
			write_at(&self.file, &cache.blank, HEADER_SIZE + slot * self.elem_size as u64)?;
		}
		drop(cache);
		self.total_slots = new_total;
		write_header(&self.file, self.total_slots, self.used_slots, self.elem_size, self.fill_byte)?;
		Ok(())
	}

	/// Read the record at `k`, consulting the cache first.
	fn read_slot(&self, k: u64) -> Result<Vec<u8>> {
		let mut cache = self.cache.lock();
		let idx = cache.index(k);
		if cache.slots[idx].key == k {
			return Ok(cache.slots[idx].record.clone());
		}
		// Miss: the prior occupant is already durable on disk (write-through),
		// so the slot can simply be overwritten with the freshly read record.
		let mut record = vec![0u8; self.elem_size as usize];
		read_at(&self.file, &mut record, HEADER_SIZE + k * self.elem_size as u64)?;
		cache.slots[idx] = CacheSlot { key: k, record: record.clone() };
		Ok(record)
	}

	/// Write-through: store `(k, record)` in the cache and flush it to disk.
	fn write_slot(&self, k: u64, record: Vec<u8>) -> Result<()> {
		let mut cache = self.cache.lock();
		let idx = cache.index(k);
		write_at(&self.file, &record, HEADER_SIZE + k * self.elem_size as u64)?;
		cache.slots[idx] = CacheSlot { key: k, record };
		Ok(())
	}

	fn parse_key(keystr: &str) -> Result<u64> {
		keystr
			.trim()
			.parse::<u64>()
			.map_err(|_| Error::BadArg(format!("VA key '{}' is not an unsigned decimal integer", keystr)))
	}

	pub fn insert(&mut self, keystr: &str, offset: u64) -> Result<()> {
		if self.mode == Mode::ReadOnly {
			return Err(Error::ReadOnlyViolation);
		}
		let k = Self::parse_key(keystr)?;
		if k < self.total_slots {
			let existing = self.read_slot(k)?;
			if !is_empty_record(&existing) {
				return Err(Error::Duplicate);
			}
		} else {
			self.extend_to(k)?;
		}
		self.write_slot(k, offset.to_le_bytes().to_vec())?;
		self.used_slots += 1;
		log::trace!(target: "indexx", "VA insert {} -> {}", k, offset);
		write_header(&self.file, self.total_slots, self.used_slots, self.elem_size, self.fill_byte)?;
		Ok(())
	}

	pub fn delete(&mut self, keystr: &str) -> Result<()> {
		if self.mode == Mode::ReadOnly {
			return Err(Error::ReadOnlyViolation);
		}
		let k = Self::parse_key(keystr)?;
		if k >= self.total_slots {
			return Err(Error::NotFound);
		}
		let existing = self.read_slot(k)?;
		if is_empty_record(&existing) {
			return Err(Error::NotFound);
		}
		let blank = self.cache.lock().blank.clone();
		self.write_slot(k, blank)?;
		self.used_slots -= 1;
		write_header(&self.file, self.total_slots, self.used_slots, self.elem_size, self.fill_byte)?;
		Ok(())
	}

	pub fn find(&self, keystr: &str) -> Result<u64> {
		let k = Self::parse_key(keystr)?;
		if k >= self.total_slots {
			return Err(Error::NotFound);
		}
		let record = self.read_slot(k)?;
		if is_empty_record(&record) {
			return Err(Error::NotFound);
		}
		Ok(u64::from_le_bytes(record[0..8].try_into().unwrap()))
	}

	pub fn size(&self) -> (u64, u64) {
		(self.total_slots, self.used_slots)
	}

	pub fn load_percent(&self) -> u8 {
		if self.total_slots == 0 {
			0
		} else {
			((self.used_slots * 100) / self.total_slots) as u8
		}
	}

	pub fn process_all(&self, mut visitor: impl FnMut(u64, u64) -> bool) -> Result<()> {
		for k in 0..self.total_slots {
			let record = self.read_slot(k)?;
			if !is_empty_record(&record) {
				let offset = u64::from_le_bytes(record[0..8].try_into().unwrap());
				if !visitor(k, offset) {
					break;
				}
			}
		}
		Ok(())
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::options::Backend;

	struct TempDir(PathBuf);

	impl TempDir {
		fn new(name: &'static str) -> TempDir {
			let mut path = std::env::temp_dir();
			path.push("indexx-test");
			path.push("va");
			path.push(name);
			if path.exists() {
				std::fs::remove_dir_all(&path).unwrap();
			}
			std::fs::create_dir_all(&path).unwrap();
			TempDir(path)
		}

		fn file(&self, name: &str) -> PathBuf {
			self.0.join(name)
		}
	}

	impl Drop for TempDir {
		fn drop(&mut self) {
			if self.0.exists() {
				std::fs::remove_dir_all(&self.0).unwrap();
			}
		}
	}

	fn options() -> Options {
		Options::new(Backend::Va, 8)
	}

	#[test]
	fn insert_and_find() {
		let dir = TempDir::new("insert_and_find");
		let path = dir.file("idx");
		let mut va = VaState::create(&path, &options()).unwrap();
		va.insert("5", 100).unwrap();
		va.insert("10", 200).unwrap();
		va.insert("5000", 300).unwrap();
		assert_eq!(va.find("5").unwrap(), 100);
		assert_eq!(va.find("10").unwrap(), 200);
		assert_eq!(va.find("5000").unwrap(), 300);
		assert!(matches!(va.find("7"), Err(Error::NotFound)));
		assert!(matches!(va.find("10000"), Err(Error::NotFound)));
		assert_eq!(va.size(), (5001, 3));
	}

	#[test]
	fn duplicate_insert_fails() {
		let dir = TempDir::new("duplicate_insert_fails");
		let path = dir.file("idx");
		let mut va = VaState::create(&path, &options()).unwrap();
		va.insert("1", 10).unwrap();
		assert!(matches!(va.insert("1", 20), Err(Error::Duplicate)));
	}

	#[test]
	fn delete_then_reinsert() {
		let dir = TempDir::new("delete_then_reinsert");
		let path = dir.file("idx");
		let mut va = VaState::create(&path, &options()).unwrap();
		va.insert("42", 7).unwrap();
		va.delete("42").unwrap();
		assert!(matches!(va.find("42"), Err(Error::NotFound)));
		assert!(matches!(va.delete("42"), Err(Error::NotFound)));
		va.insert("42", 9).unwrap();
		assert_eq!(va.find("42").unwrap(), 9);
	}

	#[test]
	fn reopen_preserves_live_mappings() {
		let dir = TempDir::new("reopen_preserves_live_mappings");
		let path = dir.file("idx");
		{
			let mut va = VaState::create(&path, &options()).unwrap();
			va.insert("1", 11).unwrap();
			va.insert("2", 22).unwrap();
			va.delete("1").unwrap();
			va.close().unwrap();
		}
		let va = VaState::open(&path, Mode::ReadWrite, crate::options::DEFAULT_VA_CACHE_SIZE).unwrap();
		assert_eq!(va.find("2").unwrap(), 22);
		assert!(matches!(va.find("1"), Err(Error::NotFound)));
	}

	#[test]
	fn bad_key_string() {
		let dir = TempDir::new("bad_key_string");
		let path = dir.file("idx");
		let mut va = VaState::create(&path, &options()).unwrap();
		assert!(matches!(va.insert("abc", 1), Err(Error::BadArg(_))));
	}

	#[test]
	fn create_fails_if_exists() {
		let dir = TempDir::new("create_fails_if_exists");
		let path = dir.file("idx");
		VaState::create(&path, &options()).unwrap();
		assert!(matches!(VaState::create(&path, &options()), Err(Error::AlreadyOpen)));
	}
}
