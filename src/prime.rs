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

//! Prime selection for SS sizing: `nextPrime` plus twin-prime pair
//! search (`totalSlots`, `totalSlots - 2`).

use rand::Rng;

const WITNESSES: u32 = 25;

/// Probabilistic Fermat-condition primality test: `a^(n-1) mod n == 1`
/// for `WITNESSES` random bases `a`. Ported from `SS.C`'s `fIsPrime`.
pub fn is_prime(n: u64) -> bool {
	if n < 2 {
		return false;
	}
	for &p in &[2u64, 3, 5, 7, 11, 13] {
		if n == p {
			return true;
		}
		if n % p == 0 {
			return false;
		}
	}
	let mut rng = rand::thread_rng();
	for _ in 0..WITNESSES {
		let a = rng.gen_range(2..n - 1);
		if mod_pow(a, n - 1, n) != 1 {
			return false;
		}
	}
	true
}

fn mod_pow(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
	if modulus == 1 {
		return 0;
	}
	let mut result: u128 = 1;
	let modulus = modulus as u128;
	base %= modulus as u64;
	let mut base = base as u128;
	while exp > 0 {
		if exp & 1 == 1 {
			result = (result * base) % modulus;
		}
		exp >>= 1;
		base = (base * base) % modulus;
	}
	result as u64
}

/// Nearest prime to `n`: searches upward if `upward`, else downward,
/// stepping by 2 over odd candidates. Ported from `SS.C`'s `vGetPrime`.
pub fn next_prime(mut n: u64, upward: bool) -> u64 {
	if n % 2 == 0 {
		n = if upward { n + 1 } else { n.saturating_sub(1) };
	}
	loop {
		if is_prime(n) {
			return n;
		}
		n = if upward { n + 2 } else { n.saturating_sub(2) };
	}
}

/// Smallest twin-prime pair `(p, p-2)` with `p >= minimum`, searching
/// upward. By convention `minimum = 0` or `1` resolves to the pair
/// `(5, 3)`, the smallest twin-prime pair there is.
pub fn next_twin_prime_pair(minimum: u64) -> (u64, u64) {
	let mut p = next_prime(minimum.max(3), true);
	loop {
		if p >= 2 && is_prime(p - 2) {
			return (p, p - 2);
		}
		p = next_prime(p + 2, true);
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn small_primes() {
		for p in [2u64, 3, 5, 7, 11, 13, 17, 97, 7919] {
			assert!(is_prime(p), "{} should be prime", p);
		}
	}

	#[test]
	fn small_composites() {
		for c in [4u64, 6, 8, 9, 15, 21, 100, 7921] {
			assert!(!is_prime(c), "{} should be composite", c);
		}
	}

	#[test]
	fn next_prime_never_composite() {
		for n in [5u64, 6, 100, 1000, 50_000] {
			let up = next_prime(n, true);
			assert!(up >= n);
			assert!(is_prime(up));
			let down = next_prime(n, false);
			assert!(down <= n);
			assert!(is_prime(down));
		}
	}

	#[test]
	fn twin_prime_pair_basics() {
		let (p, q) = next_twin_prime_pair(100);
		assert!(p >= 101);
		assert_eq!(p - 2, q);
		assert!(is_prime(p));
		assert!(is_prime(q));
	}

	#[test]
	fn zero_capacity_resolves_to_5_3() {
		// An initial capacity of 0 resolves to the smallest twin-prime
		// pair, (5, 3), rather than failing or searching forever.
		assert_eq!(next_twin_prime_pair(0), (5, 3));
	}
}
