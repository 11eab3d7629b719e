//! Profiling binary for use with valgrind/callgrind.
//!
//! # Usage
//!
//! ```bash
//! # Build with optimizations + debug symbols
//! cargo build --release --example profile
//!
//! # Run with callgrind
//! valgrind --tool=callgrind ./target/release/examples/profile [workload]
//!
//! # Analyze results
//! callgrind_annotate callgrind.out.<pid> --auto=yes
//! ```
//!
//! # Workloads
//!
//! - `insert` (default): scrambled insert stream
//! - `lookup`: probes against a pre-built set
//! - `all`: both workloads

use std::hint::black_box;

use cashew_set::{CashewSet, node_capacity};

type WideSet = CashewSet<u64, { node_capacity::<u64>() }>;

const KEYS: usize = 1_000_000;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let workload = args.get(1).map(String::as_str).unwrap_or("insert");

    match workload {
        "insert" => run_insert_workload(),
        "lookup" => run_lookup_workload(),
        "all" => {
            run_insert_workload();
            run_lookup_workload();
        }
        _ => {
            eprintln!("Unknown workload: {workload}");
            eprintln!("Available: insert, lookup, all");
            std::process::exit(1);
        }
    }
}

/// Deterministic scrambled key stream: a fixed odd multiplier visits
/// u64 values in a hash-like order without an RNG dependency.
fn scrambled(n: usize) -> impl Iterator<Item = u64> {
    (0..n as u64).map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

#[inline(never)]
fn run_insert_workload() {
    eprintln!("Running insert workload ({KEYS} keys)...");

    let mut set = WideSet::new();
    for k in scrambled(KEYS) {
        let _ = black_box(set.insert(black_box(k)));
    }
    black_box(set.len());

    eprintln!("Insert workload complete.");
}

#[inline(never)]
fn run_lookup_workload() {
    eprintln!("Running lookup workload ({KEYS} probes)...");

    let mut set = WideSet::new();
    for k in scrambled(KEYS) {
        let _ = set.insert(k);
    }

    let mut hits = 0usize;
    for k in scrambled(KEYS) {
        hits += black_box(set.count(black_box(&k)));
    }
    black_box(hits);

    eprintln!("Lookup workload complete ({hits} hits).");
}
