//! Trace-driver binary (SPEC_FULL.md §10.5).
//!
//! Replays a sequence of allocate/free/realloc operations against a
//! [`segfit::SbrkAllocator`] and, optionally, runs the consistency checker
//! after every step. This is the "test drivers, tracing infrastructure"
//! collaborator spec.md §1 places out of scope for the core — it has no
//! bearing on the allocator's semantics, it only drives them.
//!
//! Two input modes:
//!
//! - `--trace <path>`: replay a trace file. One operation per line:
//!   - `a <id> <size>`   allocate `size` bytes, remember the result as `id`
//!   - `f <id>`          free the block remembered as `id`
//!   - `r <id> <size>`   resize the block remembered as `id` to `size` bytes
//!   Blank lines and lines starting with `#` are ignored.
//! - no `--trace`: generate a synthetic workload of `--ops` operations
//!   under `--pattern`, seeded by `--seed`, matching the heterogeneous
//!   traces spec.md §1 asks the allocator to balance against.

use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use segfit::SbrkAllocator;
use std::collections::HashMap;
use std::fs;
use std::process::ExitCode;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Pattern {
    /// Uniformly random sizes, allocate-then-free-at-random order.
    Random,
    /// Long runs of same-sized allocations, freed in a burst.
    Clustered,
    /// Repeated grow/shrink of a small working set via `resize`.
    ReallocHeavy,
    /// Recursive binary-tree-shaped allocation/teardown.
    BinaryTree,
    /// Alternating alloc/free designed to stress coalescing both ways.
    CoalesceStress,
}

#[derive(Parser, Debug)]
#[command(name = "tracedrive", about = "Replays allocator traces against segfit")]
struct Args {
    /// Path to a trace file. When omitted, a synthetic trace is generated.
    #[arg(long)]
    trace: Option<String>,

    /// Synthetic workload pattern (ignored when --trace is given).
    #[arg(long, value_enum, default_value_t = Pattern::Random)]
    pattern: Pattern,

    /// Number of operations in a synthetic workload.
    #[arg(long, default_value_t = 2000)]
    ops: usize,

    /// RNG seed for synthetic workloads, for reproducible runs.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Run the consistency checker after every operation.
    #[arg(long)]
    check: bool,
}

enum Op {
    Alloc { id: u64, size: usize },
    Free { id: u64 },
    Resize { id: u64, size: usize },
}

fn parse_trace(text: &str) -> Vec<Op> {
    let mut ops = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            ["a", id, size] => ops.push(Op::Alloc {
                id: id.parse().unwrap_or_else(|_| panic!("line {}: bad id", lineno + 1)),
                size: size.parse().unwrap_or_else(|_| panic!("line {}: bad size", lineno + 1)),
            }),
            ["f", id] => ops.push(Op::Free {
                id: id.parse().unwrap_or_else(|_| panic!("line {}: bad id", lineno + 1)),
            }),
            ["r", id, size] => ops.push(Op::Resize {
                id: id.parse().unwrap_or_else(|_| panic!("line {}: bad id", lineno + 1)),
                size: size.parse().unwrap_or_else(|_| panic!("line {}: bad size", lineno + 1)),
            }),
            _ => warn!("ignoring malformed trace line {}: {:?}", lineno + 1, line),
        }
    }
    ops
}

/// Builds a synthetic trace matching one of the heterogeneous workload
/// shapes spec.md §1 names: random, clustered, realloc-heavy, binary-tree,
/// and coalescing-stress.
fn synthesize(pattern: Pattern, ops: usize, seed: u64) -> Vec<Op> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(ops);
    let mut next_id = 0u64;
    let mut live: Vec<u64> = Vec::new();

    match pattern {
        Pattern::Random => {
            for _ in 0..ops {
                if live.is_empty() || rng.gen_bool(0.6) {
                    let size = rng.gen_range(1..=512);
                    out.push(Op::Alloc { id: next_id, size });
                    live.push(next_id);
                    next_id += 1;
                } else {
                    let idx = rng.gen_range(0..live.len());
                    out.push(Op::Free { id: live.swap_remove(idx) });
                }
            }
        }
        Pattern::Clustered => {
            while out.len() < ops {
                let size = rng.gen_range(1..=256);
                let burst = rng.gen_range(4..=16);
                let mut burst_ids = Vec::new();
                for _ in 0..burst {
                    out.push(Op::Alloc { id: next_id, size });
                    burst_ids.push(next_id);
                    next_id += 1;
                }
                for id in burst_ids {
                    out.push(Op::Free { id });
                }
            }
        }
        Pattern::ReallocHeavy => {
            let working_set = 8;
            for i in 0..working_set {
                out.push(Op::Alloc { id: i, size: 32 });
            }
            while out.len() < ops {
                let id = rng.gen_range(0..working_set);
                let size = rng.gen_range(8..=2048);
                out.push(Op::Resize { id, size });
            }
        }
        Pattern::BinaryTree => {
            fn build(out: &mut Vec<Op>, next_id: &mut u64, depth: u32) -> Option<u64> {
                if depth == 0 {
                    return None;
                }
                let id = *next_id;
                *next_id += 1;
                out.push(Op::Alloc { id, size: 48 });
                build(out, next_id, depth - 1);
                build(out, next_id, depth - 1);
                Some(id)
            }
            let depth = (ops as f64).log2().max(1.0) as u32;
            build(&mut out, &mut next_id, depth);
            for id in 0..next_id {
                out.push(Op::Free { id });
            }
        }
        Pattern::CoalesceStress => {
            for _ in 0..ops / 3 {
                let a = next_id;
                out.push(Op::Alloc { id: a, size: 64 });
                next_id += 1;
                let b = next_id;
                out.push(Op::Alloc { id: b, size: 64 });
                next_id += 1;
                out.push(Op::Free { id: a });
                out.push(Op::Free { id: b });
            }
        }
    }
    out
}

fn run(ops: Vec<Op>, check_every_step: bool) -> Result<(), String> {
    let mut allocator = SbrkAllocator::default();
    let mut live: HashMap<u64, *mut u8> = HashMap::new();

    for (step, op) in ops.into_iter().enumerate() {
        match op {
            Op::Alloc { id, size } => {
                let p = allocator.allocate(size);
                if p.is_null() {
                    warn!("step {step}: allocate({size}) returned null (OOM)");
                } else {
                    live.insert(id, p);
                }
            }
            Op::Free { id } => {
                if let Some(p) = live.remove(&id) {
                    allocator.release(p);
                } else {
                    warn!("step {step}: free of unknown id {id}");
                }
            }
            Op::Resize { id, size } => match live.get(&id).copied() {
                Some(p) => {
                    let new_p = allocator.resize(p, size);
                    if new_p.is_null() && size != 0 {
                        warn!("step {step}: resize(id={id}, {size}) returned null (OOM)");
                    } else if size == 0 {
                        live.remove(&id);
                    } else {
                        live.insert(id, new_p);
                    }
                }
                None => warn!("step {step}: resize of unknown id {id}"),
            },
        }

        if check_every_step {
            if let Err(e) = allocator.check() {
                error!("step {step}: consistency check failed: {e}");
                return Err(format!("invariant violation at step {step}: {e}"));
            }
        }
    }

    if !check_every_step {
        allocator.check().map_err(|e| format!("final consistency check failed: {e}"))?;
    }

    info!("trace replay finished: {} blocks still live", live.len());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let ops = match &args.trace {
        Some(path) => {
            let text = match fs::read_to_string(path) {
                Ok(t) => t,
                Err(e) => {
                    error!("failed to read trace file {path}: {e}");
                    return ExitCode::FAILURE;
                }
            };
            parse_trace(&text)
        }
        None => {
            info!(
                "no --trace given, generating {:?} synthetic workload (seed={})",
                args.pattern, args.seed
            );
            synthesize(args.pattern, args.ops, args.seed)
        }
    };

    info!("replaying {} operations", ops.len());
    match run(ops, args.check) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            error!("{msg}");
            ExitCode::FAILURE
        }
    }
}
