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

//! Whole-crate, public-API-only coverage of the six end-to-end scenarios
//! and the testable properties against the generic `IndexHandle`
//! contract. The VA/SS backends each carry their own white-box
//! collision/resize/restore coverage; this file exercises them the way
//! a caller actually would, through `IndexHandle` and `OffsetCache`.

use std::io::Write;

use indexx::{Backend, Error, IndexHandle, Mode, OffsetCache, Options, RecordBuffer, SetPos};

struct TempDir(std::path::PathBuf);

impl TempDir {
	fn new(name: &'static str) -> TempDir {
		let mut path = std::env::temp_dir();
		path.push("indexx-test");
		path.push("scenarios");
		path.push(name);
		if path.exists() {
			std::fs::remove_dir_all(&path).unwrap();
		}
		std::fs::create_dir_all(&path).unwrap();
		TempDir(path)
	}

	fn file(&self, name: &str) -> std::path::PathBuf {
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

/// A synthetic data file of 100 fixed-length, 10-byte records: `"00000####\n"`
/// through `"00099####\n"`. Record `i` starts at byte offset `10*i`.
fn write_fixed_width_data(path: &std::path::Path, count: u32) {
	let mut file = std::fs::File::create(path).unwrap();
	for i in 0..count {
		write!(file, "{:05}####\n", i).unwrap();
	}
}

#[test]
fn ss_build_and_find() {
	let dir = TempDir::new("ss_build_and_find");
	let data_path = dir.file("data.txt");
	write_fixed_width_data(&data_path, 100);

	let options = Options::new(Backend::Ss, 5).with_capacity(100);
	let mut handle = IndexHandle::create(&dir.file("idx"), &options).unwrap();
	for i in 0..100u64 {
		let key = format!("{:05}", i);
		handle.insert(key.as_bytes(), i * 10).unwrap();
	}

	let (total, used) = handle.size();
	assert_eq!(used, 100);
	// totalSlots is always a member of a twin-prime pair.
	assert!(indexx::is_prime(total));
	assert!(indexx::is_prime(total - 2));
	assert!(total >= 100);

	assert_eq!(handle.find(b"00050").unwrap(), 500);
	handle.close().unwrap();
}

#[test]
fn ss_delete_and_find_unaffected() {
	let dir = TempDir::new("ss_delete_and_find_unaffected");
	let options = Options::new(Backend::Ss, 5).with_capacity(100);
	let mut handle = IndexHandle::create(&dir.file("idx"), &options).unwrap();
	for i in 0..100u64 {
		let key = format!("{:05}", i);
		handle.insert(key.as_bytes(), i * 10).unwrap();
	}

	handle.delete(b"00050").unwrap();
	assert!(matches!(handle.find(b"00050"), Err(Error::NotFound)));
	assert_eq!(handle.size().1, 99);
	assert_eq!(handle.find(b"00051").unwrap(), 510);
	handle.close().unwrap();
}

#[test]
fn va_sparse_growth() {
	let dir = TempDir::new("va_sparse_growth");
	let options = Options::new(Backend::Va, 8);
	let mut handle = IndexHandle::create(&dir.file("idx"), &options).unwrap();

	handle.insert(b"5", 50).unwrap();
	handle.insert(b"10", 100).unwrap();
	handle.insert(b"5000", 5000).unwrap();

	assert_eq!(handle.size().0, 5001);
	assert_eq!(handle.find(b"5").unwrap(), 50);
	assert!(matches!(handle.find(b"7"), Err(Error::NotFound)));
	assert!(matches!(handle.find(b"10000"), Err(Error::NotFound)));
	handle.close().unwrap();
}

#[test]
fn keylist_populates_offset_cache_in_order() {
	let dir = TempDir::new("keylist_populates_offset_cache_in_order");
	let options = Options::new(Backend::Ss, 5).with_capacity(20);
	let mut handle = IndexHandle::create(&dir.file("idx"), &options).unwrap();
	for i in 1..=10u64 {
		let key = format!("{:05}", i);
		handle.insert(key.as_bytes(), i * 100).unwrap();
	}

	let mut cache = OffsetCache::new();
	cache.fill_from_key_list(&handle, "00005-00007,00010").unwrap();
	assert_eq!(cache.used(), 4);
	assert_eq!(cache.entry(1), 500);
	assert_eq!(cache.entry(2), 600);
	assert_eq!(cache.entry(3), 700);
	assert_eq!(cache.entry(4), 1000);

	handle.close().unwrap();
}

#[test]
fn record_fill_reports_overflow_on_undersized_buffer() {
	let dir = TempDir::new("record_fill_reports_overflow_on_undersized_buffer");
	let data_path = dir.file("data.txt");

	// 10 records of ~20 bytes each, each starting with its key-mark byte.
	let records: Vec<String> = (0..10).map(|i| format!("K{:018}\n", i)).collect();
	let mut offsets = Vec::new();
	{
		let mut file = std::fs::File::create(&data_path).unwrap();
		let mut pos = 0u64;
		for r in &records {
			offsets.push(pos);
			file.write_all(r.as_bytes()).unwrap();
			pos += r.len() as u64;
		}
	}

	// Populate the offset cache the way a real caller would: through an
	// index whose keys map onto these record offsets, via `Find`.
	let options = Options::new(Backend::Ss, 5).with_capacity(20);
	let mut handle = IndexHandle::create(&dir.file("idx"), &options).unwrap();
	for (i, &offset) in offsets.iter().enumerate() {
		let key = format!("{:05}", i);
		handle.insert(key.as_bytes(), offset).unwrap();
	}

	let mut cache = OffsetCache::new();
	cache.fill_from_key_list(&handle, "00000-00009").unwrap();
	assert_eq!(cache.used(), 10);
	cache.reposition(SetPos::First, 10).unwrap();

	let mut data_file = std::fs::File::open(&data_path).unwrap();
	// 64 bytes fits 3 complete ~20-byte records plus terminator, not all 10.
	let mut buf = RecordBuffer::new(64, b' ', b'K');
	let result = buf.fill(&mut data_file, &mut cache);
	assert!(matches!(result, Err(Error::BufferOverflow)));
	assert_eq!(*buf.contents().last().unwrap(), 0);
	let nul_at = buf.contents().iter().position(|&b| b == 0).unwrap();
	assert!(nul_at < 64);
	// Everything after the terminator (but the forced final NUL) is fill-char.
	assert!(buf.contents()[nul_at + 1..63].iter().all(|&b| b == b' '));
	// The cache's window narrows to the records that actually fit whole.
	assert_eq!(cache.window(), (1, 3));

	handle.close().unwrap();
}

#[test]
fn open_rejects_corrupt_header_checksum() {
	let dir = TempDir::new("open_rejects_corrupt_header_checksum");
	let path = dir.file("idx");
	let options = Options::new(Backend::Ss, 5).with_capacity(20);
	let handle = IndexHandle::create(&path, &options).unwrap();
	handle.close().unwrap();

	// Flip a byte inside the checksum field of the fixed SS header
	// layout (integrity:i64 | checksum:u16 | keySize:u16 | ...).
	let mut bytes = std::fs::read(&path).unwrap();
	bytes[9] ^= 0xff;
	std::fs::write(&path, &bytes).unwrap();

	let result = IndexHandle::open(&path, Mode::ReadWrite, &options);
	assert!(matches!(result, Err(Error::WrongFile)));
}

#[test]
fn va_round_trip_survives_reopen() {
	let dir = TempDir::new("va_round_trip_survives_reopen");
	let path = dir.file("idx");
	let options = Options::new(Backend::Va, 8);
	{
		let mut handle = IndexHandle::create(&path, &options).unwrap();
		handle.insert(b"42", 4200).unwrap();
		handle.insert(b"7", 700).unwrap();
		handle.delete(b"7").unwrap();
		handle.close().unwrap();
	}

	let handle = IndexHandle::open(&path, Mode::ReadWrite, &options).unwrap();
	assert_eq!(handle.find(b"42").unwrap(), 4200);
	assert!(matches!(handle.find(b"7"), Err(Error::NotFound)));
	handle.close().unwrap();
}

#[test]
fn ss_bulk_insert_and_unknown_key_miss() {
	let dir = TempDir::new("ss_bulk_insert_and_unknown_key_miss");
	const N: u64 = 300;
	let capacity = (N as f64 / 0.75).ceil() as u64;
	let options = Options::new(Backend::Ss, 6).with_capacity(capacity);
	let mut handle = IndexHandle::create(&dir.file("idx"), &options).unwrap();

	for i in 0..N {
		let key = format!("{:06}", i);
		handle.insert(key.as_bytes(), i).unwrap();
	}
	for i in 0..N {
		let key = format!("{:06}", i);
		assert_eq!(handle.find(key.as_bytes()).unwrap(), i);
	}
	assert!(matches!(handle.find(b"999999"), Err(Error::NotFound)));
	handle.close().unwrap();
}

#[test]
fn crc_residue_holds_for_arbitrary_payloads() {
	for payload in [&b""[..], b"hello, world", b"123456789", &[0xABu8; 37][..]] {
		assert!(indexx::verify_residue(payload));
	}
}

#[test]
fn next_prime_never_returns_a_composite() {
	for n in [5u64, 101, 1_009, 20_000] {
		let up = indexx::next_prime(n, true);
		assert!(up >= n);
		assert!(indexx::is_prime(up));
		let down = indexx::next_prime(n, false);
		assert!(down <= n);
		assert!(indexx::is_prime(down));
	}
}
