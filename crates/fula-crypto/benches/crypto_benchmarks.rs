//! Benchmarks for fula-crypto

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fula_crypto::{
    hashing::hash,
    hpke::{open, seal},
    kdf::derive_record_key,
    keys::KekKeyPair,
    record::RecordKey,
};

fn bench_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashing");

    for size in [1024, 64 * 1024, 1024 * 1024].iter() {
        let data = vec![0u8; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("blake3", size), &data, |b, data| {
            b.iter(|| hash(data))
        });
    }

    group.finish();
}

fn bench_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("records");
    let key = RecordKey::generate();

    // Metadata records are small JSON documents
    for size in [256, 4 * 1024, 64 * 1024].iter() {
        let data = vec![0u8; *size];
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("seal", size), &data, |b, data| {
            b.iter(|| key.encrypt(data).unwrap())
        });

        let sealed = key.encrypt(&data).unwrap();
        group.bench_with_input(BenchmarkId::new("open", size), &sealed, |b, sealed| {
            b.iter(|| key.decrypt(sealed).unwrap())
        });
    }

    group.finish();
}

fn bench_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity");
    let identity = KekKeyPair::generate();

    group.bench_function("derive_record_key", |b| {
        b.iter(|| derive_record_key(identity.secret_key()).unwrap())
    });

    let payload = vec![0u8; 2048];
    group.bench_function("inbox_seal", |b| {
        b.iter(|| seal(identity.public_key(), &payload).unwrap())
    });

    let sealed = seal(identity.public_key(), &payload).unwrap();
    group.bench_function("inbox_open", |b| {
        b.iter(|| open(identity.secret_key(), &sealed).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_hashing, bench_records, bench_identity);
criterion_main!(benches);
