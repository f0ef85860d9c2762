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

//! Insert/find throughput workloads shared by the `stress` binary.

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use indexx::{Backend, IndexHandle, Options};

pub struct RunResult {
	pub inserts: usize,
	pub insert_time: Duration,
	pub finds: usize,
	pub find_time: Duration,
}

/// Insert `count` sequential SS keys of `key_size` bytes, then look
/// every one of them back up, reporting wall time for each phase.
pub fn run_ss(path: &std::path::Path, key_size: u16, count: u64) -> indexx::Result<RunResult> {
	let options = Options::new(Backend::Ss, key_size).with_capacity(count);
	let mut handle = IndexHandle::create(path, &options)?;

	let insert_start = Instant::now();
	for i in 0..count {
		let key = zero_padded(i, key_size);
		handle.insert(&key, i)?;
		if handle.needs_resize() {
			handle.resize(200)?;
		}
	}
	let insert_time = insert_start.elapsed();

	let find_start = Instant::now();
	for i in 0..count {
		let key = zero_padded(i, key_size);
		handle.find(&key)?;
	}
	let find_time = find_start.elapsed();

	handle.close()?;
	Ok(RunResult { inserts: count as usize, insert_time, finds: count as usize, find_time })
}

/// Insert `count` VA keys drawn from a shuffled range, then look every
/// one of them back up.
pub fn run_va(path: &std::path::Path, count: u64) -> indexx::Result<RunResult> {
	let options = Options::new(Backend::Va, 8);
	let mut handle = IndexHandle::create(path, &options)?;
	let mut keys: Vec<u64> = (0..count).collect();
	shuffle(&mut keys);

	let insert_start = Instant::now();
	for &k in &keys {
		handle.insert(k.to_string().as_bytes(), k)?;
	}
	let insert_time = insert_start.elapsed();

	let find_start = Instant::now();
	for &k in &keys {
		handle.find(k.to_string().as_bytes())?;
	}
	let find_time = find_start.elapsed();

	handle.close()?;
	Ok(RunResult { inserts: keys.len(), insert_time, finds: keys.len(), find_time })
}

fn zero_padded(n: u64, width: u16) -> Vec<u8> {
	format!("{:0width$}", n, width = width as usize).into_bytes()
}

/// Fixed seed: repeated runs insert/look up the same key order, so
/// timings are comparable across invocations.
fn shuffle(keys: &mut [u64]) {
	let mut rng = SmallRng::seed_from_u64(0x696e_6465_7878);
	for i in (1..keys.len()).rev() {
		let j = rng.gen_range(0..=i);
		keys.swap(i, j);
	}
}

#[cfg(test)]
mod test {
	use super::*;

	struct TempDir(std::path::PathBuf);

	impl TempDir {
		fn new(name: &'static str) -> TempDir {
			let mut path = std::env::temp_dir();
			path.push("indexx-bench-test");
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

	#[test]
	fn ss_workload_completes() {
		let dir = TempDir::new("ss_workload_completes");
		let result = run_ss(&dir.file("idx"), 5, 200).unwrap();
		assert_eq!(result.inserts, 200);
		assert_eq!(result.finds, 200);
	}

	#[test]
	fn va_workload_completes() {
		let dir = TempDir::new("va_workload_completes");
		let result = run_va(&dir.file("idx"), 200).unwrap();
		assert_eq!(result.inserts, 200);
		assert_eq!(result.finds, 200);
	}
}
