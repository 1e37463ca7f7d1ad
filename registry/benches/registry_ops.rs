use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fibre_registry::{make_key, Handle, Registry};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const NUM_KEYS: usize = 1_000;

// --- Setup ---

fn populated_registry() -> (Registry, Vec<String>, Vec<Handle<u64>>) {
  let registry = Registry::builder().capacity(NUM_KEYS).build().unwrap();
  let mut keys = Vec::with_capacity(NUM_KEYS);
  let mut resources = Vec::with_capacity(NUM_KEYS);

  for i in 0..NUM_KEYS {
    let index = i.to_string();
    let key = make_key!("bench:", index.as_str()).unwrap();
    let resource = Handle::new(i as u64);
    registry.put(&key, &resource).unwrap();
    keys.push(key);
    resources.push(resource);
  }

  (registry, keys, resources)
}

// --- Benchmarks ---

fn bench_single_thread(c: &mut Criterion) {
  let mut group = c.benchmark_group("single_thread");
  group.throughput(Throughput::Elements(NUM_KEYS as u64));

  let (registry, keys, _resources) = populated_registry();

  group.bench_function("get_hit", |b| {
    b.iter(|| {
      for key in &keys {
        black_box(registry.get::<u64>(key));
      }
    })
  });

  group.bench_function("get_miss", |b| {
    b.iter(|| {
      for i in 0..NUM_KEYS {
        black_box(registry.get::<u64>(i.to_le_bytes()));
      }
    })
  });

  group.bench_function("put_overwrite", |b| {
    let fresh = Handle::new(0u64);
    b.iter(|| {
      for key in &keys {
        registry.put(key, &fresh).unwrap();
      }
    })
  });

  group.bench_function("make_key", |b| {
    b.iter(|| black_box(make_key!("ab_eip:", "10.206.1.39", ",1,0").unwrap()))
  });

  group.finish();
}

fn bench_contended_get(c: &mut Criterion) {
  let mut group = c.benchmark_group("contended_get");

  for concurrency in [2usize, 4, 8] {
    group.throughput(Throughput::Elements((NUM_KEYS * concurrency) as u64));
    group.bench_with_input(
      BenchmarkId::from_parameter(concurrency),
      &concurrency,
      |b, &concurrency| {
        let (registry, keys, _resources) = populated_registry();
        let registry = Arc::new(registry);
        let keys = Arc::new(keys);

        b.iter_custom(|iters| {
          let mut total = Duration::ZERO;
          for _ in 0..iters {
            let barrier = Arc::new(Barrier::new(concurrency + 1));
            let handles: Vec<_> = (0..concurrency)
              .map(|_| {
                let registry = registry.clone();
                let keys = keys.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                  barrier.wait();
                  for key in keys.iter() {
                    black_box(registry.get::<u64>(key));
                  }
                })
              })
              .collect();

            barrier.wait();
            let start = Instant::now();
            for handle in handles {
              handle.join().unwrap();
            }
            total += start.elapsed();
          }
          total
        })
      },
    );
  }

  group.finish();
}

criterion_group!(benches, bench_single_thread, bench_contended_get);
criterion_main!(benches);
