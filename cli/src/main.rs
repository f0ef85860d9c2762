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

//! `indexx`: the index-make driver as a standalone binary.

use std::path::PathBuf;
use std::process::exit;

use structopt::StructOpt;

use indexx::{build_index, interactive_lookup, Backend, Options};

#[derive(Debug, StructOpt)]
#[structopt(name = "indexx", about = "Build and query a fixed-key index over a data file")]
struct Args {
	/// Data file to scan for key-marked records.
	#[structopt(short = "d", long = "data")]
	data: PathBuf,

	/// Fixed key length in bytes.
	#[structopt(short = "k", long = "key-size")]
	key_size: u16,

	/// Index file to create (defaults to the data file path with an
	/// `.idx` extension).
	#[structopt(short = "i", long = "index")]
	index: Option<PathBuf>,

	/// Key-mark byte identifying the first line of a record (default `:`).
	#[structopt(short = "m", long = "mark", default_value = ":")]
	mark: char,

	/// Initial SS capacity (ignored for VA, which grows lazily).
	#[structopt(short = "h", long = "initial", default_value = "100")]
	initial: u64,

	/// Report progress to standard output while building.
	#[structopt(short = "v", long = "verbose")]
	verbose: bool,

	/// Drop into an interactive key-lookup loop after the build completes.
	#[structopt(short = "t", long = "interactive")]
	interactive: bool,

	/// Backend to build: `va` or `ss` (default `ss`).
	#[structopt(long = "backend", default_value = "ss")]
	backend: String,
}

fn run(args: Args) -> indexx::Result<()> {
	let backend = match args.backend.as_str() {
		"va" => Backend::Va,
		"ss" => Backend::Ss,
		other => return Err(indexx::Error::BadArg(format!("unknown backend '{}', expected 'va' or 'ss'", other))),
	};
	let index_path = args.index.unwrap_or_else(|| args.data.with_extension("idx"));
	let options = Options::new(backend, args.key_size).with_capacity(args.initial);
	let mark = args.mark as u8;

	let handle = build_index(&args.data, &index_path, &options, mark, args.verbose)?;

	if args.interactive {
		let stdin = std::io::stdin();
		let stdout = std::io::stdout();
		interactive_lookup(&handle, stdin.lock(), stdout.lock())?;
	}

	handle.close()
}

fn main() {
	env_logger::try_init().ok();
	let args = Args::from_args();
	if let Err(e) = run(args) {
		eprintln!("indexx: {}", e);
		exit(1);
	}
}
