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

//! `OffsetCache`: a growable, 1-indexed sequence of data-file offsets
//! with a sliding `(top, bot)` window.

use crate::error::{Error, Result};
use crate::index::IndexHandle;
use crate::keylist::KeyListExpander;

const INITIAL_CAPACITY: usize = 100;
const GROWTH_FACTOR: f64 = 2.0;
const FALLBACK_GROWTH_FACTOR: f64 = 1.2;

/// Symbolic window anchors accepted by `reposition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetPos {
	First,
	Previous,
	Current,
	Next,
	Last,
	Absolute(u64),
}

pub struct OffsetCache {
	entries: Vec<u64>,
	used: usize,
	top: usize,
	bot: usize,
}

impl OffsetCache {
	pub fn new() -> OffsetCache {
		OffsetCache { entries: vec![0; INITIAL_CAPACITY], used: 0, top: 0, bot: 0 }
	}

	fn grow(&mut self) -> Result<()> {
		let current = self.entries.len();
		let mut new_cap = ((current as f64) * GROWTH_FACTOR).ceil() as usize;
		if self.entries.try_reserve_exact(new_cap.saturating_sub(current)).is_err() {
			new_cap = ((current as f64) * FALLBACK_GROWTH_FACTOR).ceil() as usize;
			if new_cap <= current || self.entries.try_reserve_exact(new_cap - current).is_err() {
				return Err(Error::BadAlloc);
			}
		}
		self.entries.resize(new_cap, 0);
		Ok(())
	}

	fn push(&mut self, offset: u64) -> Result<()> {
		if self.used == self.entries.len() {
			self.grow()?;
		}
		self.entries[self.used] = offset;
		self.used += 1;
		Ok(())
	}

	/// 1-based accessor; `n` must be in `[1, used]`.
	pub fn entry(&self, n: usize) -> u64 {
		self.entries[n - 1]
	}

	pub fn used(&self) -> usize {
		self.used
	}

	pub fn window(&self) -> (usize, usize) {
		(self.top, self.bot)
	}

	/// Narrows the window's `bot` edge down to `last_complete`, called by
	/// the record-fill algorithm when a buffer overflow truncates the
	/// effective range to the last record that fit whole.
	pub(crate) fn truncate_window_bot(&mut self, last_complete: usize) {
		self.bot = self.bot.min(last_complete);
	}

	/// `FillFromKeyList`: clears the cache and re-populates it from
	/// `Find`ing every key the expander yields, skipping misses.
	pub fn fill_from_key_list(&mut self, handle: &IndexHandle, key_list: &str) -> Result<()> {
		let expander = KeyListExpander::new(key_list, handle.key_size())?;
		self.used = 0;
		self.top = 0;
		self.bot = 0;
		for key in expander {
			match handle.find(&key) {
				Ok(offset) => self.push(offset)?,
				Err(Error::NotFound) => {}
				Err(e) => return Err(e),
			}
		}
		Ok(())
	}

	/// `FillFromSearchExpression`: filters the cache in place to
	/// only the entries whose referenced data record matches `pattern`,
	/// reading each record through `data_file` and tagging non-matches
	/// with the `u64::MAX` sentinel before a single left-to-right
	/// compaction pass.
	pub fn filter_by_search(&mut self, data_file: &mut std::fs::File, pattern: &[u8], key_mark: u8, record_limit: usize) -> Result<()> {
		let machine = crate::search::build_search(pattern);
		for i in 0..self.used {
			let record = crate::recordbuf::read_record(data_file, self.entries[i], key_mark, record_limit)?;
			if !machine.is_match(&record) {
				self.entries[i] = u64::MAX;
			}
		}
		let mut write = 0;
		for read in 0..self.used {
			if self.entries[read] != u64::MAX {
				self.entries[write] = self.entries[read];
				write += 1;
			}
		}
		self.used = write;
		self.top = 0;
		self.bot = 0;
		Ok(())
	}

	/// Recompute `(top, bot)` from a symbolic or absolute anchor plus a
	/// signed window height.
	pub fn reposition(&mut self, set_pos: SetPos, set_size: i64) -> Result<()> {
		if self.used == 0 {
			self.top = 0;
			self.bot = 0;
			return Ok(());
		}
		let mut top = match set_pos {
			SetPos::First => 1,
			SetPos::Last => self.used,
			SetPos::Current => self.top.max(1),
			SetPos::Previous => {
				let window_height = self.bot.saturating_sub(self.top) + 1;
				self.top.saturating_sub(window_height).max(1)
			}
			SetPos::Next => self.bot + 1,
			SetPos::Absolute(k) => k as usize,
		};
		top = top.clamp(1, self.used);

		let sign: i64 = set_size.signum();
		let mut bot = (top as i64) + (set_size - sign);
		bot = bot.clamp(1, self.used as i64);
		let mut bot = bot as usize;

		if bot < top {
			std::mem::swap(&mut top, &mut bot);
		}
		self.top = top;
		self.bot = bot;
		Ok(())
	}
}

impl Default for OffsetCache {
	fn default() -> Self {
		OffsetCache::new()
	}
}

#[cfg(test)]
impl OffsetCache {
	/// Test-only entry point for exercising the record-fill window logic
	/// without needing a live `IndexHandle` to drive `fill_from_key_list`.
	pub(crate) fn push_for_test(&mut self, offset: u64) {
		self.push(offset).unwrap();
	}
}
