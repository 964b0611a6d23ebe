use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use expiring_map::{ExpiringMap, Owner};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> Owner<String> {
    Owner::new(format!("k{:016x}", n))
}

fn bench_put(c: &mut Criterion) {
    c.bench_function("expiring_map_put_10k", |b| {
        b.iter_batched(
            || {
                let keys: Vec<_> = lcg(1).take(10_000).map(key).collect();
                (ExpiringMap::<String, u64>::new(), keys)
            },
            |(mut m, keys)| {
                for (i, k) in keys.iter().enumerate() {
                    m.put(k, i as u64);
                }
                // Keep the owners alive until after the map is measured.
                black_box((m, keys))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("expiring_map_get_hit", |b| {
        let mut m = ExpiringMap::new();
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            m.put(k, i as u64);
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k.as_str()));
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("expiring_map_get_miss", |b| {
        let mut m = ExpiringMap::new();
        let keys: Vec<_> = lcg(11).take(10_000).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            m.put(k, i as u64);
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = format!("k{:016x}", miss.next().unwrap());
            black_box(m.get(k.as_str()));
        })
    });
}

fn bench_expire_and_sweep(c: &mut Criterion) {
    c.bench_function("expiring_map_expire_sweep_10k", |b| {
        b.iter_batched(
            || {
                let mut m = ExpiringMap::<String, u64>::new();
                let keys: Vec<_> = lcg(3).take(10_000).map(key).collect();
                for (i, k) in keys.iter().enumerate() {
                    m.put(k, i as u64);
                }
                (m, keys)
            },
            |(mut m, keys)| {
                drop(keys);
                black_box(m.sweep());
                m
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_len_with_pending(c: &mut Criterion) {
    c.bench_function("expiring_map_len_half_expired", |b| {
        let mut m = ExpiringMap::new();
        let mut keys: Vec<_> = lcg(5).take(10_000).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            m.put(k, i as u64);
        }
        keys.truncate(5_000);
        b.iter(|| black_box(m.len()))
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_put, bench_get_hit, bench_get_miss, bench_expire_and_sweep, bench_len_with_pending
}
criterion_main!(benches);
