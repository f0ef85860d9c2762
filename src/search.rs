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

//! The text-search primitive the key-access layer runs records through
//! for `FillFromSearchExpression`. The actual matching algorithms
//! (Aho-Corasick, Boyer-Moore, a boolean expression compiler, ...) are
//! an external collaborator; the core only depends on the two-operation
//! capability below. `NaiveSearch` is the one concrete implementation
//! carried in this crate, enough to drive the offset-cache filtering
//! path end to end.

const MAX_PATTERN_LEN: usize = 128;

/// An opaque, already-built search machine: `build(pattern)` then
/// `run(text)` repeatedly against candidate records.
pub trait Search {
	fn is_match(&self, text: &[u8]) -> bool;
}

/// Builds a `Search` machine from a pattern captured from the record
/// buffer, bounded to `MAX_PATTERN_LEN` bytes.
pub fn build_search(pattern: &[u8]) -> Box<dyn Search> {
	let bounded = &pattern[..pattern.len().min(MAX_PATTERN_LEN)];
	Box::new(NaiveSearch { pattern: bounded.to_vec() })
}

/// Plain substring search. Stand-in for the project's real matchers,
/// which live outside this crate's scope.
struct NaiveSearch {
	pattern: Vec<u8>,
}

impl Search for NaiveSearch {
	fn is_match(&self, text: &[u8]) -> bool {
		if self.pattern.is_empty() {
			return true;
		}
		text.windows(self.pattern.len()).any(|w| w == self.pattern.as_slice())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn matches_substring() {
		let machine = build_search(b"needle");
		assert!(machine.is_match(b"a haystack with a needle in it"));
		assert!(!machine.is_match(b"nothing to find here"));
	}

	#[test]
	fn empty_pattern_matches_everything() {
		let machine = build_search(b"");
		assert!(machine.is_match(b"anything"));
	}

	#[test]
	fn pattern_bounded_to_max_length() {
		let long = vec![b'x'; 500];
		let machine = build_search(&long);
		assert!(machine.is_match(&vec![b'x'; MAX_PATTERN_LEN]));
	}
}
