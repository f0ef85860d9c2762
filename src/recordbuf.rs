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

//! `RecordBuffer` and the record-fill algorithm: reads the data-file
//! records named by an `OffsetCache` window into a fixed-size buffer,
//! each record delimited by a leading key-mark byte.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::offset_cache::OffsetCache;

const BLKSIZ: usize = 128;

/// A fixed-size byte region holding the concatenation of the records
/// named by the cache's current window, `'\0'`-terminated, with any
/// trailing space cleared to `fill_char`.
pub struct RecordBuffer {
	data: Vec<u8>,
	fill_char: u8,
	key_mark: u8,
}

impl RecordBuffer {
	pub fn new(size: u16, fill_char: u8, key_mark: u8) -> RecordBuffer {
		RecordBuffer { data: vec![fill_char; size as usize], fill_char, key_mark }
	}

	pub fn contents(&self) -> &[u8] {
		&self.data
	}

	fn size(&self) -> usize {
		self.data.len()
	}

	/// Fill the buffer with the records named by `cache`'s `[top, bot]`
	/// window, read from `data_file` starting at each entry's byte
	/// offset. On overflow, rolls the buffer back to the last record
	/// that fit whole and narrows `cache`'s window to match.
	pub fn fill(&mut self, data_file: &mut std::fs::File, cache: &mut OffsetCache) -> Result<()> {
		let (top, bot) = cache.window();
		let mut write_pos = 0usize;
		let mut overflowed = false;
		let mut last_record_start = 0usize;
		let mut last_complete_n = top.saturating_sub(1);

		let range: Vec<usize> = if top == 0 { Vec::new() } else { (top..=bot).collect() };
		'records: for n in range {
			last_record_start = write_pos;
			data_file.seek(SeekFrom::Start(cache.entry(n)))?;
			let mut first_block = true;

			loop {
				let space_left = self.size().saturating_sub(write_pos);
				let block = std::cmp::min(BLKSIZ, space_left.saturating_sub(1));
				if block == 0 {
					overflowed = true;
					break 'records;
				}
				let mut chunk = vec![0u8; block];
				let read = read_partial(data_file, &mut chunk)?;
				if read == 0 {
					break; // EOF: record done
				}
				let chunk = &chunk[..read];

				let scan_from = if first_block { 1 } else { 0 };
				first_block = false;
				let mark = chunk.iter().skip(scan_from).position(|&b| b == self.key_mark);

				if let Some(rel) = mark {
					let k = scan_from + rel;
					self.data[write_pos..write_pos + k].copy_from_slice(&chunk[..k]);
					write_pos += k;
					break; // record done
				} else {
					self.data[write_pos..write_pos + chunk.len()].copy_from_slice(chunk);
					write_pos += chunk.len();
					if read < block {
						break; // short read: EOF, record done
					}
				}
			}
			last_complete_n = n;
		}

		if overflowed {
			write_pos = last_record_start;
			cache.truncate_window_bot(last_complete_n);
		}

		self.data[write_pos] = 0;
		for b in &mut self.data[write_pos + 1..] {
			*b = self.fill_char;
		}
		let last = self.size() - 1;
		self.data[last] = 0;

		if overflowed {
			Err(Error::BufferOverflow)
		} else {
			Ok(())
		}
	}
}

/// Read the single record at `offset` into a scratch buffer, applying
/// the same key-mark scan as `fill`. Used by `FillFromSearchExpression`,
/// which runs the search machine over one record at a time rather than
/// a whole window.
pub fn read_record(data_file: &mut std::fs::File, offset: u64, key_mark: u8, max_len: usize) -> Result<Vec<u8>> {
	data_file.seek(SeekFrom::Start(offset))?;
	let mut out = Vec::new();
	let mut first_block = true;
	loop {
		if out.len() >= max_len {
			break;
		}
		let block = std::cmp::min(BLKSIZ, max_len - out.len());
		let mut chunk = vec![0u8; block];
		let read = read_partial(data_file, &mut chunk)?;
		if read == 0 {
			break;
		}
		let chunk = &chunk[..read];
		let scan_from = if first_block { 1 } else { 0 };
		first_block = false;
		match chunk.iter().skip(scan_from).position(|&b| b == key_mark) {
			Some(rel) => {
				out.extend_from_slice(&chunk[..scan_from + rel]);
				break;
			}
			None => {
				out.extend_from_slice(chunk);
				if read < block {
					break;
				}
			}
		}
	}
	Ok(out)
}

fn read_partial(file: &mut std::fs::File, buf: &mut [u8]) -> Result<usize> {
	let mut total = 0;
	while total < buf.len() {
		match file.read(&mut buf[total..]) {
			Ok(0) => break,
			Ok(n) => total += n,
			Err(e) => return Err(e.into()),
		}
	}
	Ok(total)
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Write;

	struct TempDir(std::path::PathBuf);

	impl TempDir {
		fn new(name: &'static str) -> TempDir {
			let mut path = std::env::temp_dir();
			path.push("indexx-test");
			path.push("recordbuf");
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

	fn write_records(path: &std::path::Path, records: &[&str]) -> Vec<u64> {
		let mut file = std::fs::File::create(path).unwrap();
		let mut offsets = Vec::new();
		let mut pos = 0u64;
		for r in records {
			offsets.push(pos);
			file.write_all(r.as_bytes()).unwrap();
			pos += r.len() as u64;
		}
		offsets
	}

	// The record-fill algorithm only cares about populated entries and a
	// positioned window, so tests build the cache directly rather than
	// through a live `IndexHandle` and `fill_from_key_list`.
	fn direct_cache(offsets: &[u64]) -> OffsetCache {
		let mut cache = OffsetCache::default();
		for &o in offsets {
			cache.push_for_test(o);
		}
		cache
	}

	#[test]
	fn fills_complete_records_within_buffer() {
		let dir = TempDir::new("fills_complete_records_within_buffer");
		let path = dir.file("data");
		// Each record starts with its own key-mark byte ('K').
		let offsets = write_records(&path, &["Kabc;", "Kdef;", "Kghi;"]);
		let mut cache = direct_cache(&offsets);
		cache.reposition(crate::offset_cache::SetPos::First, 3).unwrap();

		let mut data_file = std::fs::File::open(&path).unwrap();
		let mut buf = RecordBuffer::new(64, b' ', b'K');
		buf.fill(&mut data_file, &mut cache).unwrap();
		let text = std::str::from_utf8(buf.contents()).unwrap();
		assert!(text.starts_with("Kabc;Kdef;Kghi;\0"));
	}

	#[test]
	fn overflow_rolls_back_partial_record() {
		let dir = TempDir::new("overflow_rolls_back_partial_record");
		let path = dir.file("data");
		let offsets = write_records(&path, &["Kaaaaaaaaaa;", "Kbbbbbbbbbb;", "Kcccccccccc;"]);
		let mut cache = direct_cache(&offsets);
		cache.reposition(crate::offset_cache::SetPos::First, 3).unwrap();

		let mut data_file = std::fs::File::open(&path).unwrap();
		// Buffer fits the first 12-byte record plus terminator, but not
		// a second one: the second record's partial bytes are rolled back.
		let mut buf = RecordBuffer::new(14, b'-', b'K');
		let result = buf.fill(&mut data_file, &mut cache);
		assert!(matches!(result, Err(Error::BufferOverflow)));
		assert!(buf.contents().starts_with(b"Kaaaaaaaaaa;"));
		let nul_at = buf.contents().iter().position(|&b| b == 0).unwrap();
		assert_eq!(nul_at, 12, "only the complete first record survives");
		assert_eq!(*buf.contents().last().unwrap(), 0);
		assert_eq!(cache.window(), (1, 1), "window.bot narrows to the last complete record");
	}
}
