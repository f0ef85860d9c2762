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

//! Key-list grammar and expander.
//!
//! `KeyList := KeySpec ("," KeySpec)*`, each `KeySpec` a singleton, a
//! range `A-B`, or a class `template-`. Expansion turns each spec into
//! one or more concrete `keySize`-byte keys; the whole list is exposed
//! as a restartable lazy iterator that yields one key per step.

use crate::error::{Error, Result};

const COLLATE: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn collate_index(b: u8) -> Option<usize> {
	COLLATE.iter().position(|&c| c == b)
}

enum Spec {
	Singleton(Vec<u8>),
	Range(Vec<u8>, Vec<u8>),
	Class(Vec<u8>),
}

/// One position's ordered set of candidate values for a given spec.
type Field = Vec<Vec<u8>>;

fn parse_spec(token: &str, key_size: usize) -> Result<Spec> {
	let bytes = token.as_bytes();
	let dash_positions: Vec<usize> = bytes.iter().enumerate().filter(|(_, &b)| b == b'-').map(|(i, _)| i).collect();

	match dash_positions.len() {
		0 => {
			if bytes.len() != key_size {
				return Err(Error::BadList(format!("key '{}' is not {} bytes", token, key_size)));
			}
			Ok(Spec::Singleton(bytes.to_vec()))
		}
		1 => {
			let dash = dash_positions[0];
			if dash == bytes.len() - 1 {
				let template = &bytes[..dash];
				if template.len() != key_size {
					return Err(Error::BadList(format!("class '{}' is not {} bytes", token, key_size)));
				}
				Ok(Spec::Class(template.to_vec()))
			} else {
				let a = &bytes[..dash];
				let b = &bytes[dash + 1..];
				if a.len() != key_size || b.len() != key_size {
					return Err(Error::BadList(format!("range '{}' operands are not {} bytes", token, key_size)));
				}
				Ok(Spec::Range(a.to_vec(), b.to_vec()))
			}
		}
		_ => Err(Error::BadList(format!("key-list entry '{}' has more than one '-'", token))),
	}
}

fn parse_decimal_run(bytes: &[u8]) -> u64 {
	let mut v: u64 = 0;
	for &b in bytes {
		v = v * 10 + (b - b'0') as u64;
	}
	v
}

/// Expand a `Range(a, b)` into its left-to-right fields: maximal
/// decimal-digit runs become positional odometer counts; every other
/// position cycles independently through the collating sequence.
fn range_fields(a: &[u8], b: &[u8]) -> Result<Vec<Field>> {
	let len = a.len();
	let mut fields = Vec::new();
	let mut i = 0;
	while i < len {
		if a[i].is_ascii_digit() && b[i].is_ascii_digit() {
			let mut j = i + 1;
			while j < len && a[j].is_ascii_digit() && b[j].is_ascii_digit() {
				j += 1;
			}
			let width = j - i;
			let lo = parse_decimal_run(&a[i..j]);
			let hi = parse_decimal_run(&b[i..j]);
			// A backwards run (lo > hi) silently collapses to the single
			// value `lo`, rather than failing the whole key list.
			let values: Field = if lo > hi {
				vec![format!("{:0width$}", lo, width = width).into_bytes()]
			} else {
				(lo..=hi).map(|v| format!("{:0width$}", v, width = width).into_bytes()).collect()
			};
			fields.push(values);
			i = j;
		} else {
			let lo = collate_index(a[i]).ok_or_else(|| Error::BadList("range byte outside collating sequence".to_string()))?;
			let hi = collate_index(b[i]).ok_or_else(|| Error::BadList("range byte outside collating sequence".to_string()))?;
			// A backwards run (lo > hi) silently collapses to the single key A.
			let values: Field = if lo > hi { vec![vec![COLLATE[lo]]] } else { (lo..=hi).map(|idx| vec![COLLATE[idx]]).collect() };
			fields.push(values);
			i += 1;
		}
	}
	Ok(fields)
}

/// Expand a `Class(template)` into its per-position fields: `#`, `@`,
/// `*` each range over their class; every other byte is a literal.
fn class_fields(template: &[u8]) -> Vec<Field> {
	template
		.iter()
		.map(|&b| match b {
			b'#' => (b'0'..=b'9').map(|d| vec![d]).collect(),
			b'@' => (b'a'..=b'z').chain(b'A'..=b'Z').map(|d| vec![d]).collect(),
			b'*' => (b'0'..=b'9').chain(b'a'..=b'z').chain(b'A'..=b'Z').map(|d| vec![d]).collect(),
			other => vec![vec![other]],
		})
		.collect()
}

fn spec_fields(spec: &Spec) -> Result<Vec<Field>> {
	match spec {
		Spec::Singleton(k) => Ok(vec![vec![k.clone()]]),
		Spec::Range(a, b) => range_fields(a, b),
		Spec::Class(template) => Ok(class_fields(template)),
	}
}

/// A parsed, restartable key-list expander. Construction validates the
/// whole grammar up front (`Error::BadList` on any violation); iteration
/// itself cannot fail and produces one key per step.
pub struct KeyListExpander {
	fields_per_spec: Vec<Vec<Field>>,
	spec_idx: usize,
	counters: Vec<usize>,
}

impl KeyListExpander {
	pub fn new(key_list: &str, key_size: u16) -> Result<KeyListExpander> {
		let trimmed = key_list.trim_end_matches(|c| c == '\n' || c == '\r');
		let key_size = key_size as usize;
		let mut fields_per_spec = Vec::new();
		if !trimmed.is_empty() {
			for token in trimmed.split(',') {
				let spec = parse_spec(token, key_size)?;
				fields_per_spec.push(spec_fields(&spec)?);
			}
		}
		let counters = if fields_per_spec.is_empty() { Vec::new() } else { vec![0; fields_per_spec[0].len()] };
		Ok(KeyListExpander { fields_per_spec, spec_idx: 0, counters })
	}

	/// Restart the iterator from the first key of the first spec.
	pub fn reset(&mut self) {
		self.spec_idx = 0;
		self.counters = if self.fields_per_spec.is_empty() { Vec::new() } else { vec![0; self.fields_per_spec[0].len()] };
	}
}

impl Iterator for KeyListExpander {
	type Item = Vec<u8>;

	fn next(&mut self) -> Option<Vec<u8>> {
		if self.spec_idx >= self.fields_per_spec.len() {
			return None;
		}
		let fields = &self.fields_per_spec[self.spec_idx];
		let mut key = Vec::new();
		for (field, &idx) in fields.iter().zip(self.counters.iter()) {
			key.extend_from_slice(&field[idx]);
		}

		// Advance the odometer: rightmost field fastest, carrying left.
		let mut i = fields.len();
		loop {
			if i == 0 {
				self.spec_idx += 1;
				self.counters =
					if self.spec_idx < self.fields_per_spec.len() { vec![0; self.fields_per_spec[self.spec_idx].len()] } else { Vec::new() };
				break;
			}
			i -= 1;
			self.counters[i] += 1;
			if self.counters[i] < fields[i].len() {
				break;
			}
			self.counters[i] = 0;
		}

		Some(key)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn expand(list: &str, key_size: u16) -> Vec<String> {
		KeyListExpander::new(list, key_size).unwrap().map(|k| String::from_utf8(k).unwrap()).collect()
	}

	#[test]
	fn singleton() {
		assert_eq!(expand("12345", 5), vec!["12345"]);
	}

	#[test]
	fn mixed_list_of_singletons_ranges_and_a_class() {
		let got = expand("20240,20259,20713-20715,649#3-,01267", 5);
		let want: Vec<String> = ["20240", "20259", "20713", "20714", "20715", "64903", "64913", "64923", "64933", "64943", "64953", "64963", "64973", "64983", "64993", "01267"]
			.iter()
			.map(|s| s.to_string())
			.collect();
		assert_eq!(got, want);
	}

	#[test]
	fn decimal_run_range() {
		assert_eq!(
			expand("15-29", 2),
			vec!["15", "16", "17", "18", "19", "20", "21", "22", "23", "24", "25", "26", "27", "28", "29"]
		);
	}

	#[test]
	fn empty_list_yields_nothing() {
		assert_eq!(expand("", 5), Vec::<String>::new());
	}

	#[test]
	fn short_key_fails_bad_list() {
		assert!(matches!(KeyListExpander::new("123", 5), Err(Error::BadList(_))));
	}

	#[test]
	fn restart_reproduces_sequence() {
		let mut exp = KeyListExpander::new("00005-00007,00010", 5).unwrap();
		let first: Vec<Vec<u8>> = exp.by_ref().collect();
		exp.reset();
		let second: Vec<Vec<u8>> = exp.collect();
		assert_eq!(first, second);
		assert_eq!(first.len(), 4);
	}

	#[test]
	fn class_expansion_at_sign() {
		assert_eq!(expand("a@c-", 3), vec!["aac", "abc", "acc", "adc", "aec", "afc", "agc", "ahc", "aic", "ajc", "akc", "alc", "amc", "anc", "aoc", "apc", "aqc", "arc", "asc", "atc", "auc", "avc", "awc", "axc", "ayc", "azc", "aAc", "aBc", "aCc", "aDc", "aEc", "aFc", "aGc", "aHc", "aIc", "aJc", "aKc", "aLc", "aMc", "aNc", "aOc", "aPc", "aQc", "aRc", "aSc", "aTc", "aUc", "aVc", "aWc", "aXc", "aYc", "aZc"]);
	}

	#[test]
	fn backwards_decimal_range_yields_only_the_start_key() {
		assert_eq!(expand("29-15", 2), vec!["29"]);
	}

	#[test]
	fn backwards_collating_range_yields_only_the_start_key() {
		assert_eq!(expand("z-a", 1), vec!["z"]);
	}
}
