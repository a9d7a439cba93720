//! Query benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jsondb_bench::populated;
use jsondb_core::{Config, Database, ModifyOutcome, Value};

fn json(text: &str) -> Value {
    Value::from_json_str(text).unwrap()
}

/// Benchmark filtered reads over collections of growing size.
fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");

    for count in [100, 1_000, 10_000].iter() {
        let db = populated(*count);
        let players = db.collection("players").unwrap();
        group.throughput(Throughput::Elements(*count as u64));

        let point = json(r#"{"level": 7}"#);
        group.bench_with_input(BenchmarkId::new("point", count), &point, |b, filter| {
            b.iter(|| players.find(black_box(filter)).unwrap().count().unwrap());
        });

        let range = json(r#"{"score": {"$gte": 2000, "$lt": 3000}}"#);
        group.bench_with_input(BenchmarkId::new("range", count), &range, |b, filter| {
            b.iter(|| players.find(black_box(filter)).unwrap().count().unwrap());
        });

        let like = json(r#"{"name": {"$like": "A%"}, "active": true}"#);
        group.bench_with_input(BenchmarkId::new("like", count), &like, |b, filter| {
            b.iter(|| players.find(black_box(filter)).unwrap().ids().unwrap());
        });

        let scan = json(r#"{"score": {"$ne": 0}}"#);
        group.bench_with_input(BenchmarkId::new("scan", count), &scan, |b, filter| {
            b.iter(|| players.find(black_box(filter)).unwrap().count().unwrap());
        });
    }
    group.finish();
}

/// Benchmark sorted pagination.
fn bench_sorted_page(c: &mut Criterion) {
    let db = populated(5_000);
    let players = db.collection("players").unwrap();
    let sort = json(r#"["-score", "name"]"#);

    c.bench_function("sorted_page", |b| {
        b.iter(|| {
            players
                .find_sorted(&Value::Null, black_box(&sort))
                .unwrap()
                .all_in_range(100..120)
                .unwrap()
        });
    });
}

/// Benchmark view compilation with and without the cache.
fn bench_view_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_cache");
    let filter = json(r#"{"score": {"$gt": 10}, "tags": {"$in": ["tag-1", "tag-2"]}}"#);
    let sort = json(r#"[{"level": "asc"}, {"score": "desc"}]"#);

    for capacity in [0, 64] {
        let config = Config::default().view_cache_capacity(capacity);
        let db = Database::open_in_memory_with_config(config).unwrap();
        let players = db.collection("players").unwrap();
        group.bench_function(BenchmarkId::from_parameter(capacity), |b| {
            b.iter(|| players.find_sorted(black_box(&filter), black_box(&sort)).unwrap());
        });
    }
    group.finish();
}

/// Benchmark atomic find-and-modify.
fn bench_modify(c: &mut Criterion) {
    let db = populated(1_000);
    let players = db.collection("players").unwrap();
    let query = players.find(&json(r#"{"level": 3}"#)).unwrap();

    c.bench_function("first_and_modify", |b| {
        b.iter(|| {
            query
                .first_and_modify(|player| {
                    let wins = player
                        .get("stats")
                        .and_then(|s| s.get("wins"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    if let Some(stats) = player.get_mut("stats") {
                        stats.insert("wins", wins + 1);
                    }
                    ModifyOutcome::UPDATE | ModifyOutcome::RETURN_NEW
                })
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_find,
    bench_sorted_page,
    bench_view_cache,
    bench_modify
);
criterion_main!(benches);
