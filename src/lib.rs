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

//! An embedded indexing engine mapping fixed-length string or numeric
//! keys to byte offsets in an external record-structured data file.
//!
//! Two interchangeable backends sit behind one contract,
//! [`IndexHandle`]: a direct-addressed **Virtual Array** ([`va`]) and an
//! open-addressed, double-hashed **Scatter Storage** table ([`ss`]).
//! [`keylist`], [`offset_cache`] and [`recordbuf`] form the key-access
//! layer on top: expand a comma-separated key-list or search expression
//! into a scrolling window of data-file records.

mod crc;
mod display;
mod driver;
mod error;
mod index;
mod keylist;
mod offset_cache;
mod options;
mod prime;
mod recordbuf;
mod search;
mod ss;
mod va;

pub use crc::{checksum, verify_residue, Crc16, RESIDUE};
pub use driver::{build_index, interactive_lookup};
pub use error::{Error, Result};
pub use index::{Entry, IndexHandle};
pub use keylist::KeyListExpander;
pub use offset_cache::{OffsetCache, SetPos};
pub use options::{Backend, HashFunction, Mode, Options};
pub use prime::{is_prime, next_prime, next_twin_prime_pair};
pub use recordbuf::RecordBuffer;
pub use search::{build_search, Search};
