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

//! The index-make driver: scans a data file for key-marked records and
//! builds an index from them, plus the interactive post-build lookup
//! loop the CLI's `-t` flag drives.

use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::index::IndexHandle;
use crate::offset_cache::OffsetCache;
use crate::options::Options;

/// Builds a fresh index at `index_path` from the key-marked records of
/// `data_path`. Returns the open handle, already `Insert`ed and, for an
/// SS backend, resized as needed, but not yet `Close`d; the caller
/// decides when the build session ends.
pub fn build_index(data_path: &Path, index_path: &Path, options: &Options, key_mark: u8, verbose: bool) -> Result<IndexHandle> {
	let mut handle = IndexHandle::create(index_path, options)?;
	if verbose {
		let (total, used) = handle.size();
		println!("created index: total={} used={}", total, used);
	}

	let data_file = std::fs::File::open(data_path)?;
	let mut reader = std::io::BufReader::new(data_file);
	let key_size = options.key_size as usize;
	let mut offset: u64 = 0;
	let mut line = Vec::new();

	loop {
		line.clear();
		let read = read_line_bytes(&mut reader, &mut line)?;
		if read == 0 {
			break;
		}
		let record_offset = offset;
		offset += read as u64;

		if line.first() != Some(&key_mark) {
			continue;
		}
		let key = extract_key(&line, key_size);

		match handle.insert(&key, record_offset) {
			Ok(()) => {}
			Err(Error::Duplicate) => {
				log::warn!(target: "indexx", "duplicate key at offset {}, skipped", record_offset);
			}
			Err(e) => return Err(e),
		}

		if handle.needs_resize() {
			handle.resize(200)?;
			if verbose {
				let (total, used) = handle.size();
				println!("resized index: total={} used={}", total, used);
			}
		}
	}

	if verbose {
		let (total, used) = handle.size();
		println!("build complete: total={} used={} load={}%", total, used, handle.load_percent());
	}
	Ok(handle)
}

/// Extract bytes `1..1+keySize` of a record's first line, right-padding
/// with ASCII space if the line is short and truncating if long.
fn extract_key(line: &[u8], key_size: usize) -> Vec<u8> {
	let body = if line.len() > 1 { &line[1..] } else { &[] };
	let mut key = vec![b' '; key_size];
	let copy_len = body.len().min(key_size);
	key[..copy_len].copy_from_slice(&body[..copy_len]);
	key
}

/// Reads one LF- or CRLF-delimited line (without the terminator) into
/// `buf`, returning the number of bytes consumed from the stream
/// (terminator included), so the caller can track file offsets.
fn read_line_bytes(reader: &mut impl BufRead, buf: &mut Vec<u8>) -> Result<usize> {
	let mut raw = Vec::new();
	let consumed = reader.read_until(b'\n', &mut raw)?;
	if consumed == 0 {
		return Ok(0);
	}
	if raw.last() == Some(&b'\n') {
		raw.pop();
		if raw.last() == Some(&b'\r') {
			raw.pop();
		}
	}
	*buf = raw;
	Ok(consumed)
}

/// Interactive post-build lookup loop driving the CLI's `-t` mode: reads
/// a key-list line at a time from `input`, fills an offset cache through
/// the open handle, and writes the resulting offsets to `output`.
pub fn interactive_lookup(handle: &IndexHandle, mut input: impl BufRead, mut output: impl Write) -> Result<()> {
	let mut line = String::new();
	loop {
		line.clear();
		let read = input.read_line(&mut line)?;
		if read == 0 {
			break;
		}
		let trimmed = line.trim_end_matches(|c| c == '\n' || c == '\r');
		if trimmed.is_empty() {
			continue;
		}

		let mut cache = OffsetCache::new();
		match cache.fill_from_key_list(handle, trimmed) {
			Ok(()) => {
				for n in 1..=cache.used() {
					writeln!(output, "{}", cache.entry(n))?;
				}
			}
			Err(e) => writeln!(output, "error: {}", e)?,
		}
	}
	Ok(())
}
