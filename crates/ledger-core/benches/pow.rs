use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{Block, Transaction};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn sample_block() -> Block {
    let mut rng = StdRng::seed_from_u64(42);
    let txs: Vec<Transaction> = (0..10)
        .map(|i| Transaction::new(format!("alice-{i}"), "bob", rng.gen_range(1..10)))
        .collect();
    Block::new(1, txs, [0u8; 32])
}

fn bench_pow(c: &mut Criterion) {
    let block = sample_block();

    c.bench_function("mine_difficulty_3", |b| {
        b.iter(|| {
            let mut candidate = block.clone();
            candidate.mine(3);
            candidate
        });
    });

    c.bench_function("mine_parallel_difficulty_3", |b| {
        b.iter(|| {
            let mut candidate = block.clone();
            candidate.mine_parallel(3);
            candidate
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
