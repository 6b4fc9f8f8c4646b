// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use criterion::{criterion_group, criterion_main, Criterion};

use engine::{
    kdf::{self, MIN_ITERATIONS},
    read_safe, write_safe, Entry, FieldCipher, Header, SealedField,
};

fn bench_stretch(c: &mut Criterion) {
    let salt = [7u8; kdf::SALT_LEN];

    c.bench_function("Stretch a passphrase at the iteration floor", |b| {
        b.iter(|| kdf::stretch(b"correct horse", &salt, MIN_ITERATIONS).unwrap());
    });
}

fn bench_field_seal_open(c: &mut Criterion) {
    let fc = FieldCipher::new();

    c.bench_function("Seal and open one field", |b| {
        b.iter(|| {
            let sealed = SealedField::seal(b"a moderately long secret value", &fc);
            sealed.open(&fc)
        });
    });
}

fn bench_safe_roundtrip(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.psafe3");
    let fc = FieldCipher::new();

    let mut entries = Vec::new();
    for i in 0..16 {
        let mut entry = Entry::new(&fc);
        entry.set_title(&format!("service {}", i), &fc);
        entry.set_username("bench", &fc);
        entry.set_password("benchmark password", &fc);
        entry.set_notes(&"n".repeat(512), &fc);
        entries.push(entry);
    }

    c.bench_function("Write and read a 16 entry database", |b| {
        b.iter(|| {
            write_safe(&path, b"pw", MIN_ITERATIONS, &Header::new(), &entries, &fc).unwrap();
            read_safe(&path, b"pw", &fc).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_stretch,
    bench_field_seal_open,
    bench_safe_roundtrip
);
criterion_main!(benches);
