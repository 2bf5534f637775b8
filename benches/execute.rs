use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rowlock::{LockManager, LockType, Lockable};

struct Row {
    id: u64,
}

impl Lockable for Row {
    type Id = u64;
    fn lock_id(&self) -> u64 {
        self.id
    }
}

fn execute_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute_uncontended");
    for (name, lock_type) in [
        ("read", LockType::Read),
        ("write", LockType::Write),
        ("global", LockType::Global),
    ] {
        let manager = LockManager::new();
        let row = Row { id: 1 };
        group.bench_function(name, |b| {
            b.iter(|| manager.execute(&row, lock_type, |row| row.id).unwrap());
        });
    }
}

fn execute_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute_contended");
    for rows in [1u64, 8, 64] {
        let manager = LockManager::new();
        group.bench_function(BenchmarkId::new("write", rows), |b| {
            b.iter(|| {
                (0..1024u64).into_par_iter().for_each(|i| {
                    let row = Row { id: i % rows };
                    manager.execute(&row, LockType::Write, |_| ()).unwrap();
                });
            });
        });
    }
}

criterion_group!(benches, execute_uncontended, execute_contended);
criterion_main!(benches);
