//! Criterion benchmarks across the heterogeneous workload traces spec.md
//! §1 asks the allocator to balance throughput and space utilization
//! against: random, clustered, realloc-heavy, binary-tree-shaped, and
//! coalescing-stress.
//!
//! Runs against a fixed-size in-memory [`HeapProvider`] rather than the
//! real process break, so repeated criterion samples don't grow the
//! benchmark process's address space without bound.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use segfit::{Allocator, HeapError, HeapProvider};

/// A [`HeapProvider`] backed by a large pre-allocated, never-moved buffer.
/// Its address is stable for the buffer's lifetime, which a `Vec<u8>`
/// backing a growing `sbrk` region is not expected to provide, so the
/// buffer is sized up front and `sbrk` simply advances a cursor into it.
struct ArenaProvider {
    buf: Box<[u8]>,
    base: usize,
    used: usize,
}

impl ArenaProvider {
    fn new(capacity: usize) -> Self {
        let buf = vec![0u8; capacity].into_boxed_slice();
        let base = buf.as_ptr() as usize;
        Self { buf, base, used: 0 }
    }
}

impl HeapProvider for ArenaProvider {
    fn heap_low(&self) -> usize {
        self.base
    }

    fn heap_high(&self) -> usize {
        self.base + self.used
    }

    fn sbrk(&mut self, n: usize) -> Result<usize, HeapError> {
        if self.used + n > self.buf.len() {
            return Err(HeapError::BrkFailed { requested: n });
        }
        let old = self.base + self.used;
        self.used += n;
        Ok(old)
    }
}

const ARENA_BYTES: usize = 64 * 1024 * 1024;
const OPS: usize = 4000;

fn bench_random(c: &mut Criterion) {
    c.bench_function("random", |b| {
        b.iter(|| {
            let mut a = Allocator::new(ArenaProvider::new(ARENA_BYTES));
            let mut rng = StdRng::seed_from_u64(42);
            let mut live = Vec::new();
            for _ in 0..OPS {
                if live.is_empty() || rng.gen_bool(0.6) {
                    let p = a.allocate(rng.gen_range(1..=512));
                    if !p.is_null() {
                        live.push(p);
                    }
                } else {
                    let idx = rng.gen_range(0..live.len());
                    a.release(live.swap_remove(idx));
                }
            }
        })
    });
}

fn bench_clustered(c: &mut Criterion) {
    c.bench_function("clustered", |b| {
        b.iter(|| {
            let mut a = Allocator::new(ArenaProvider::new(ARENA_BYTES));
            let mut rng = StdRng::seed_from_u64(7);
            let mut done = 0;
            while done < OPS {
                let size = rng.gen_range(1..=256);
                let burst = rng.gen_range(4..=16);
                let mut ids = Vec::new();
                for _ in 0..burst {
                    let p = a.allocate(size);
                    if !p.is_null() {
                        ids.push(p);
                    }
                }
                for p in ids {
                    a.release(p);
                }
                done += burst;
            }
        })
    });
}

fn bench_realloc_heavy(c: &mut Criterion) {
    c.bench_function("realloc_heavy", |b| {
        b.iter(|| {
            let mut a = Allocator::new(ArenaProvider::new(ARENA_BYTES));
            let mut rng = StdRng::seed_from_u64(99);
            let mut live: Vec<*mut u8> = (0..8).map(|_| a.allocate(32)).collect();
            for _ in 0..OPS {
                let idx = rng.gen_range(0..live.len());
                let size = rng.gen_range(8..=2048);
                live[idx] = a.resize(live[idx], size);
            }
        })
    });
}

fn bench_binary_tree(c: &mut Criterion) {
    fn build(a: &mut Allocator<ArenaProvider>, depth: u32, out: &mut Vec<*mut u8>) {
        if depth == 0 {
            return;
        }
        out.push(a.allocate(48));
        build(a, depth - 1, out);
        build(a, depth - 1, out);
    }

    c.bench_function("binary_tree", |b| {
        b.iter(|| {
            let mut a = Allocator::new(ArenaProvider::new(ARENA_BYTES));
            let mut nodes = Vec::new();
            build(&mut a, 12, &mut nodes);
            for p in nodes {
                a.release(p);
            }
        })
    });
}

fn bench_coalesce_stress(c: &mut Criterion) {
    c.bench_function("coalesce_stress", |b| {
        b.iter(|| {
            let mut a = Allocator::new(ArenaProvider::new(ARENA_BYTES));
            for _ in 0..OPS / 2 {
                let x = a.allocate(64);
                let y = a.allocate(64);
                a.release(x);
                a.release(y);
            }
        })
    });
}

fn bench_best_fit_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_fit_by_population");
    for &n in &[64usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut a = Allocator::new(ArenaProvider::new(ARENA_BYTES));
                let mut live = Vec::with_capacity(n);
                for i in 0..n {
                    live.push(a.allocate(64 + (i % 7) * 8));
                }
                for p in &live {
                    a.release(*p);
                }
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_random,
    bench_clustered,
    bench_realloc_heavy,
    bench_binary_tree,
    bench_coalesce_stress,
    bench_best_fit_scaling,
);
criterion_main!(benches);
