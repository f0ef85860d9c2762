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

//! Standalone stress-test driver for the VA and SS backends.

use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "stress", about = "Insert/find throughput workloads for indexx backends")]
struct Args {
	/// Directory to create scratch index files in.
	#[structopt(short = "p", long = "path", default_value = ".")]
	path: PathBuf,

	/// Number of keys to insert and then look up.
	#[structopt(short = "c", long = "count", default_value = "100000")]
	count: u64,

	/// Fixed key length in bytes for the SS run.
	#[structopt(short = "k", long = "key-size", default_value = "8")]
	key_size: u16,

	/// Skip the SS workload.
	#[structopt(long = "no-ss")]
	no_ss: bool,

	/// Skip the VA workload.
	#[structopt(long = "no-va")]
	no_va: bool,
}

fn report(label: &str, result: &indexx_bench::RunResult) {
	println!(
		"{}: {} inserts in {:?} ({:.0}/s), {} finds in {:?} ({:.0}/s)",
		label,
		result.inserts,
		result.insert_time,
		result.inserts as f64 / result.insert_time.as_secs_f64(),
		result.finds,
		result.find_time,
		result.finds as f64 / result.find_time.as_secs_f64(),
	);
}

fn main() {
	env_logger::try_init().ok();
	let args = Args::from_args();

	if !args.no_ss {
		let path = args.path.join("stress_ss.idx");
		let _ = std::fs::remove_file(&path);
		match indexx_bench::run_ss(&path, args.key_size, args.count) {
			Ok(result) => report("ss", &result),
			Err(e) => eprintln!("ss run failed: {}", e),
		}
		let _ = std::fs::remove_file(&path);
	}

	if !args.no_va {
		let path = args.path.join("stress_va.idx");
		let _ = std::fs::remove_file(&path);
		match indexx_bench::run_va(&path, args.count) {
			Ok(result) => report("va", &result),
			Err(e) => eprintln!("va run failed: {}", e),
		}
		let _ = std::fs::remove_file(&path);
	}
}
