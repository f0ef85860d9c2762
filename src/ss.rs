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

// On-disk data layout for the Scatter-Storage (open-addressed, double
// hashed) backend.
//
// [ integrity:i64 | checksum:u16 | keySize:u16 | totalSlots:u64 | usedSlots:u64 | slot[0..totalSlots] ]
// slot := [ status:i32 | key:keySize | offset:u64 ]
//
// `integrity` is `-1` after a clean close, `0` while open for writing.
// `checksum` is the CRC-16 of the 18-byte sizeInfo that follows it.

use std::convert::TryInto;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::crc;
use crate::error::{Error, Result};
use crate::options::{HashFunction, Mode, Options};
use crate::prime;

const INTEGRITY_OK: i64 = -1;
const INTEGRITY_UNCLEAN: i64 = 0;
const SIZE_INFO_LEN: usize = 2 + 8 + 8;
pub const HEADER_SIZE: u64 = 8 + 2 + SIZE_INFO_LEN as u64;

const STATUS_VACANT: i32 = 0;
const STATUS_USED: i32 = 1;
const STATUS_DELETED: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotStatus {
	Vacant,
	Used,
	Deleted,
}

impl SlotStatus {
	fn from_i32(v: i32) -> SlotStatus {
		match v {
			STATUS_USED => SlotStatus::Used,
			STATUS_DELETED => SlotStatus::Deleted,
			_ => SlotStatus::Vacant,
		}
	}
	fn as_i32(self) -> i32 {
		match self {
			SlotStatus::Vacant => STATUS_VACANT,
			SlotStatus::Used => STATUS_USED,
			SlotStatus::Deleted => STATUS_DELETED,
		}
	}
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

/// Primary hash, default PJW (Peter J. Weinberger compiler hash).
fn hash(key: &[u8], modulus: u64) -> u64 {
	if modulus == 0 {
		return 0;
	}
	primary_hash(key, HashFunction::Pjw, modulus)
}

fn primary_hash(key: &[u8], function: HashFunction, modulus: u64) -> u64 {
	if modulus == 0 {
		return 0;
	}
	match function {
		HashFunction::Fll => {
			if key.is_empty() {
				return 0;
			}
			let first = key[0] as u64;
			let last = key[key.len() - 1] as u64;
			((first << 8) + last + key.len() as u64) % modulus
		}
		HashFunction::Add => {
			let mut h: u64 = key.first().copied().unwrap_or(0) as u64;
			for &b in key {
				h = ((h << 8).wrapping_add(b as u64)) % modulus;
			}
			h
		}
		HashFunction::Pjw => {
			const W: u32 = 32;
			let high_mask: u64 = 0xf << (W - 4);
			let mut h: u64 = 0;
			for &b in key {
				h = ((h << (W / 8)) + b as u64) & 0xffff_ffff;
				let top = h & high_mask;
				if top != 0 {
					h = (h ^ (top >> (3 * W / 4))) & !high_mask & 0xffff_ffff;
				}
			}
			h % modulus
		}
	}
}

/// Double-hashing increment, computed over the twin-prime modulus
/// `totalSlots - 2`.
fn rehash_increment(key: &[u8], function: HashFunction, twin_modulus: u64) -> u64 {
	if twin_modulus == 0 {
		return 1;
	}
	primary_hash(key, function, twin_modulus) + 1
}

/// In-core state of an open Scatter-Storage handle.
pub struct SsState {
	file: std::fs::File,
	path: PathBuf,
	key_size: u16,
	total_slots: u64,
	used_slots: u64,
	mode: Mode,
	hash_function: HashFunction,
	resize_threshold_percent: u8,
	resize_lock: Mutex<()>,
}

fn slot_bytes(key_size: u16) -> u64 {
	4 + key_size as u64 + 8
}

fn slot_offset(key_size: u16, slot: u64) -> u64 {
	HEADER_SIZE + slot * slot_bytes(key_size)
}

fn size_info_bytes(key_size: u16, total_slots: u64, used_slots: u64) -> [u8; SIZE_INFO_LEN] {
	let mut buf = [0u8; SIZE_INFO_LEN];
	buf[0..2].copy_from_slice(&key_size.to_le_bytes());
	buf[2..10].copy_from_slice(&total_slots.to_le_bytes());
	buf[10..18].copy_from_slice(&used_slots.to_le_bytes());
	buf
}

fn write_header(file: &std::fs::File, integrity: i64, key_size: u16, total_slots: u64, used_slots: u64) -> Result<()> {
	let size_info = size_info_bytes(key_size, total_slots, used_slots);
	let checksum = crc::checksum(&size_info);
	let mut header = [0u8; HEADER_SIZE as usize];
	header[0..8].copy_from_slice(&integrity.to_le_bytes());
	header[8..10].copy_from_slice(&checksum.to_le_bytes());
	header[10..].copy_from_slice(&size_info);
	write_at(file, &header, 0)
}

struct Slot {
	status: SlotStatus,
	key: Vec<u8>,
	offset: u64,
}

impl SsState {
	fn read_slot(&self, idx: u64) -> Result<Slot> {
		let mut buf = vec![0u8; slot_bytes(self.key_size) as usize];
		read_at(&self.file, &mut buf, slot_offset(self.key_size, idx))?;
		let status = SlotStatus::from_i32(i32::from_le_bytes(buf[0..4].try_into().unwrap()));
		let key = buf[4..4 + self.key_size as usize].to_vec();
		let offset = u64::from_le_bytes(buf[4 + self.key_size as usize..].try_into().unwrap());
		Ok(Slot { status, key, offset })
	}

	fn write_slot(&self, idx: u64, slot: &Slot) -> Result<()> {
		let mut buf = vec![0u8; slot_bytes(self.key_size) as usize];
		buf[0..4].copy_from_slice(&slot.status.as_i32().to_le_bytes());
		buf[4..4 + self.key_size as usize].copy_from_slice(&slot.key);
		buf[4 + self.key_size as usize..].copy_from_slice(&slot.offset.to_le_bytes());
		write_at(&self.file, &buf, slot_offset(self.key_size, idx))
	}

	fn twin_modulus(&self) -> u64 {
		self.total_slots.saturating_sub(2)
	}

	fn check_key_len(&self, key: &[u8]) -> Result<()> {
		if key.len() != self.key_size as usize {
			return Err(Error::BadArg(format!("key length {} does not match index key size {}", key.len(), self.key_size)));
		}
		Ok(())
	}

	/// Common probe-sequence engine shared by `Find`/`Delete` and
	/// the duplicate-check half of `Insert`.
	fn locate(&self, key: &[u8]) -> Result<Option<(u64, Slot)>> {
		self.check_key_len(key)?;
		let mut slot_idx = primary_hash(key, self.hash_function, self.total_slots);
		// Computed once per lookup, per SS.C's dwRehashFunc fFirstHash gate.
		let increment = rehash_increment(key, self.hash_function, self.twin_modulus());
		loop {
			let slot = self.read_slot(slot_idx)?;
			match slot.status {
				SlotStatus::Vacant => return Ok(None),
				SlotStatus::Used if slot.key == key => return Ok(Some((slot_idx, slot))),
				SlotStatus::Used | SlotStatus::Deleted => {
					slot_idx = (slot_idx + increment) % self.total_slots;
				}
			}
		}
	}

	/// `Create(path, keySize, initialCapacity)`.
	pub fn create(path: &Path, options: &Options) -> Result<SsState> {
		if path.exists() {
			return Err(Error::AlreadyOpen);
		}
		// initialCapacity=0 resolves to the (5, 3) pair, the smallest
		// twin-prime pair there is.
		let (total_slots, _twin) = prime::next_twin_prime_pair(options.initial_capacity + 1);
		let file = std::fs::OpenOptions::new().create(true).read(true).write(true).open(path)?;
		write_header(&file, INTEGRITY_UNCLEAN, options.key_size, total_slots, 0)?;
		let vacant = Slot { status: SlotStatus::Vacant, key: vec![0u8; options.key_size as usize], offset: 0 };
		let mut buf = Vec::with_capacity(slot_bytes(options.key_size) as usize);
		buf.extend_from_slice(&vacant.status.as_i32().to_le_bytes());
		buf.extend_from_slice(&vacant.key);
		buf.extend_from_slice(&vacant.offset.to_le_bytes());
		for slot in 0..total_slots {
			write_at(&file, &buf, slot_offset(options.key_size, slot))?;
		}
		log::debug!(target: "indexx", "SS created at {} with {} slots", path.display(), total_slots);
		Ok(SsState {
			file,
			path: path.to_path_buf(),
			key_size: options.key_size,
			total_slots,
			used_slots: 0,
			mode: Mode::ReadWrite,
			hash_function: options.hash_function,
			resize_threshold_percent: options.resize_threshold_percent,
			resize_lock: Mutex::new(()),
		})
	}

	/// `Open(path, mode)`.
	pub fn open(path: &Path, mode: Mode, options: &Options) -> Result<SsState> {
		let mut file = std::fs::OpenOptions::new().read(true).write(mode == Mode::ReadWrite).open(path)?;
		let mut header = [0u8; HEADER_SIZE as usize];
		file.seek(SeekFrom::Start(0))?;
		file.read_exact(&mut header)?;
		let integrity = i64::from_le_bytes(header[0..8].try_into().unwrap());
		let stored_checksum = u16::from_le_bytes(header[8..10].try_into().unwrap());
		let size_info = &header[10..];
		if crc::checksum(size_info) != stored_checksum {
			return Err(Error::WrongFile);
		}
		let key_size = u16::from_le_bytes(size_info[0..2].try_into().unwrap());
		let mut total_slots = u64::from_le_bytes(size_info[2..10].try_into().unwrap());
		let mut used_slots = u64::from_le_bytes(size_info[10..18].try_into().unwrap());

		let mut state = SsState {
			file,
			path: path.to_path_buf(),
			key_size,
			total_slots,
			used_slots,
			mode,
			hash_function: options.hash_function,
			resize_threshold_percent: options.resize_threshold_percent,
			resize_lock: Mutex::new(()),
		};

		if integrity != INTEGRITY_OK {
			log::warn!(target: "indexx", "SS {} was not closed cleanly, restoring", path.display());
			state.restore()?;
			total_slots = state.total_slots;
			used_slots = state.used_slots;
		}

		if mode == Mode::ReadWrite {
			write_header(&state.file, INTEGRITY_UNCLEAN, key_size, total_slots, used_slots)?;
		}
		log::debug!(target: "indexx", "SS opened {}: total={} used={}", path.display(), total_slots, used_slots);
		Ok(state)
	}

	/// Recomputes `totalSlots` from file length, rescans all slots to
	/// recount `usedSlots`. Never modifies slot data.
	fn restore(&mut self) -> Result<()> {
		let file_len = self.file.metadata()?.len();
		let bytes = slot_bytes(self.key_size);
		self.total_slots = (file_len.saturating_sub(HEADER_SIZE)) / bytes;
		let mut used = 0u64;
		for idx in 0..self.total_slots {
			if self.read_slot(idx)?.status == SlotStatus::Used {
				used += 1;
			}
		}
		self.used_slots = used;
		Ok(())
	}

	pub fn close(mut self) -> Result<()> {
		if self.mode == Mode::ReadWrite {
			write_header(&self.file, INTEGRITY_OK, self.key_size, self.total_slots, self.used_slots)?;
		}
		Ok(())
	}

	pub fn insert(&mut self, key: &[u8], offset: u64) -> Result<()> {
		if self.mode == Mode::ReadOnly {
			return Err(Error::ReadOnlyViolation);
		}
		self.check_key_len(key)?;
		if self.used_slots + 2 > self.total_slots {
			return Err(Error::Full);
		}
		let mut slot_idx = primary_hash(key, self.hash_function, self.total_slots);
		let increment = rehash_increment(key, self.hash_function, self.twin_modulus());
		loop {
			let slot = self.read_slot(slot_idx)?;
			match slot.status {
				SlotStatus::Vacant | SlotStatus::Deleted => {
					self.write_slot(slot_idx, &Slot { status: SlotStatus::Used, key: key.to_vec(), offset })?;
					self.used_slots += 1;
					log::trace!(target: "indexx", "SS insert {} -> {} at slot {}", crate::display::hex(key), offset, slot_idx);
					return Ok(());
				}
				SlotStatus::Used if slot.key == key => return Err(Error::Duplicate),
				SlotStatus::Used => {
					slot_idx = (slot_idx + increment) % self.total_slots;
				}
			}
		}
	}

	pub fn delete(&mut self, key: &[u8]) -> Result<()> {
		if self.mode == Mode::ReadOnly {
			return Err(Error::ReadOnlyViolation);
		}
		match self.locate(key)? {
			Some((idx, mut slot)) => {
				slot.status = SlotStatus::Deleted;
				self.write_slot(idx, &slot)?;
				self.used_slots -= 1;
				Ok(())
			}
			None => Err(Error::NotFound),
		}
	}

	pub fn find(&self, key: &[u8]) -> Result<u64> {
		log::trace!(target: "indexx", "SS find {}", crate::display::hex(key));
		match self.locate(key)? {
			Some((_, slot)) => Ok(slot.offset),
			None => Err(Error::NotFound),
		}
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

	pub fn needs_resize(&self) -> bool {
		self.load_percent() >= self.resize_threshold_percent
	}

	pub fn process_all(&self, mut visitor: impl FnMut(&[u8], u64) -> bool) -> Result<()> {
		for idx in 0..self.total_slots {
			let slot = self.read_slot(idx)?;
			if slot.status == SlotStatus::Used {
				if !visitor(&slot.key, slot.offset) {
					break;
				}
			}
		}
		Ok(())
	}

	/// `Resize(handle, percent)`: grows to `max(used, total*percent/100)`
	/// rounded up to the next twin-prime pair, re-inserting every live
	/// entry through `ProcessAll`/`Insert`. Any failure leaves the
	/// original file untouched.
	pub fn resize(&mut self, percent: u32) -> Result<()> {
		if self.mode == Mode::ReadOnly {
			return Err(Error::ReadOnlyViolation);
		}
		let _guard = self.resize_lock.lock();
		let wanted = std::cmp::max(self.used_slots, (self.total_slots as u128 * percent as u128 / 100) as u64);
		let (new_total, _) = prime::next_twin_prime_pair(wanted + 1);

		let tmp_path = self.path.with_extension("ss_tmp");
		if tmp_path.exists() {
			std::fs::remove_file(&tmp_path)?;
		}
		let result = self.resize_into(&tmp_path, new_total);
		match result {
			Ok(()) => {
				std::fs::remove_file(&self.path)?;
				std::fs::rename(&tmp_path, &self.path)?;
				let file = std::fs::OpenOptions::new().read(true).write(true).open(&self.path)?;
				self.file = file;
				self.total_slots = new_total;
				log::info!(target: "indexx", "SS {} resized to {} slots", self.path.display(), new_total);
				Ok(())
			}
			Err(e) => {
				let _ = std::fs::remove_file(&tmp_path);
				Err(e)
			}
		}
	}

	/// Builds a fresh `new_total`-slot table at `tmp_path`, re-inserting
	/// every live entry. Writes the exact slot count `resize` computed;
	/// unlike `create`, this does not re-round through
	/// `next_twin_prime_pair`, since `new_total` is already a twin prime.
	fn resize_into(&self, tmp_path: &Path, new_total: u64) -> Result<()> {
		let file = std::fs::OpenOptions::new().create_new(true).read(true).write(true).open(tmp_path)?;
		write_header(&file, INTEGRITY_UNCLEAN, self.key_size, new_total, 0)?;
		let vacant = Slot { status: SlotStatus::Vacant, key: vec![0u8; self.key_size as usize], offset: 0 };
		let mut buf = Vec::with_capacity(slot_bytes(self.key_size) as usize);
		buf.extend_from_slice(&vacant.status.as_i32().to_le_bytes());
		buf.extend_from_slice(&vacant.key);
		buf.extend_from_slice(&vacant.offset.to_le_bytes());
		for slot in 0..new_total {
			write_at(&file, &buf, slot_offset(self.key_size, slot))?;
		}

		let mut new_state = SsState {
			file,
			path: tmp_path.to_path_buf(),
			key_size: self.key_size,
			total_slots: new_total,
			used_slots: 0,
			mode: Mode::ReadWrite,
			hash_function: self.hash_function,
			resize_threshold_percent: self.resize_threshold_percent,
			resize_lock: Mutex::new(()),
		};
		let mut insert_err = None;
		self.process_all(|key, offset| {
			if let Err(e) = new_state.insert(key, offset) {
				insert_err = Some(e);
				return false;
			}
			true
		})?;
		if let Some(e) = insert_err {
			return Err(e);
		}
		new_state.close()?;
		Ok(())
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn key_size(&self) -> u16 {
		self.key_size
	}
}
