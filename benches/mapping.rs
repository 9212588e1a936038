//! Benchmarks for record mapping and change detection.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use docmap::bson::oid::ObjectId;
use docmap::bson::{Bson, doc};
use docmap::diff::diff_documents;
use docmap::mapping::{apply_document, to_document};
use docmap::model::Model;
use docmap::value::ZeroValue;
use docmap::{Record, Timestamps};
use std::hint::black_box;

#[derive(Debug, Clone, PartialEq, Record)]
struct Address {
    street: String,
    city: String,
    zip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Record)]
struct Customer {
    #[docmap(id)]
    id: ObjectId,
    #[docmap(name = "displayName")]
    name: String,
    email: String,
    age: i32,
    balance: u64,
    #[docmap(omit_empty)]
    tags: Vec<String>,
    address: Address,
    #[docmap(inline)]
    timestamps: Timestamps,
}

fn customer() -> Customer {
    Customer {
        id: ObjectId::new(),
        name: "Ada Lovelace".into(),
        email: "ada@example.com".into(),
        age: 36,
        balance: 1_000_000,
        tags: vec!["vip".into(), "math".into(), "engines".into()],
        address: Address {
            street: "12 St James's Square".into(),
            city: "London".into(),
            zip: Some("SW1Y 4JH".into()),
        },
        timestamps: Timestamps::now(),
    }
}

/// Benchmark record → document mapping.
fn bench_to_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_document");
    let record = customer();

    group.bench_function("customer", |b| {
        b.iter(|| black_box(to_document(black_box(&record))))
    });

    for len in [10usize, 100, 1000] {
        let mut record = customer();
        record.tags = (0..len).map(|i| format!("tag-{i}")).collect();
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("tags", len), &record, |b, record| {
            b.iter(|| black_box(to_document(black_box(record))))
        });
    }

    group.finish();
}

/// Benchmark document → record application.
fn bench_apply_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_document");
    let doc = to_document(&customer()).ok().flatten().unwrap_or_default();

    group.bench_function("customer", |b| {
        b.iter(|| {
            let mut target = Customer::zero();
            black_box(apply_document(&mut target, black_box(&doc)))
        })
    });

    let model = Model::new(&Customer::zero()).ok();
    if let Some(model) = model {
        group.bench_function("hydrate", |b| {
            b.iter(|| black_box(model.hydrate(black_box(&doc))))
        });
    }

    group.finish();
}

/// Benchmark snapshot diffing.
fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");
    let before = to_document(&customer()).ok().flatten().unwrap_or_default();

    group.bench_function("unchanged", |b| {
        b.iter(|| black_box(diff_documents(Some(&before), Some(&before))))
    });

    let mut after = before.clone();
    after.insert("email", "countess@example.com");
    after.insert("address", doc! { "street": "x", "city": "Ockham" });
    after.remove("tags");
    group.bench_function("three_changes", |b| {
        b.iter(|| black_box(diff_documents(Some(&before), Some(&after))))
    });

    let wide_before: docmap::bson::Document =
        (0..200).map(|i| (format!("k{i}"), Bson::Int32(i))).collect();
    let mut wide_after = wide_before.clone();
    wide_after.insert("k199", -1);
    group.bench_function("wide_200", |b| {
        b.iter(|| black_box(diff_documents(Some(&wide_before), Some(&wide_after))))
    });

    group.finish();
}

criterion_group!(benches, bench_to_document, bench_apply_document, bench_diff);
criterion_main!(benches);
