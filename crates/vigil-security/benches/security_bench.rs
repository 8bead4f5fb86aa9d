// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for envelope encryption and verdict evaluation.

use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use vigil_bridge::fake::FakeBridge;
use vigil_core::{PlatformKind, Verdict};
use vigil_integrity::IntegrityEngine;
use vigil_security::{SecureCipherEngine, SoftwareKeyStore};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Encrypt-then-decrypt at message sizes from a token to a small document.
fn bench_envelope_roundtrip(c: &mut Criterion) {
    let engine = SecureCipherEngine::new(Arc::new(SoftwareKeyStore::new()), "bench");
    let sizes: &[(&str, usize)] = &[("16 B", 16), ("1 KiB", 1024), ("64 KiB", 64 * 1024)];

    let mut group = c.benchmark_group("envelope_roundtrip");
    for &(label, size) in sizes {
        let message = "v".repeat(size);
        group.bench_function(label, |b| {
            b.iter(|| {
                let envelope = engine.encrypt(black_box(&message)).expect("encrypt failed");
                let opened = engine.decrypt(&envelope).expect("decrypt failed");
                black_box(opened);
            });
        });
    }
    group.finish();
}

/// Envelope parsing alone, including the rejection path.
fn bench_envelope_decrypt_reject(c: &mut Criterion) {
    let engine = SecureCipherEngine::new(Arc::new(SoftwareKeyStore::new()), "bench-reject");

    c.bench_function("decrypt_invalid_envelope", |b| {
        b.iter(|| {
            let result = engine.decrypt(black_box("not-base64!!"));
            assert!(result.is_err());
        });
    });
}

/// Every verdict against a clean fake Android device: the worst case, since
/// no probe short-circuits.
fn bench_evaluate_all(c: &mut Criterion) {
    let bridge = Arc::new(FakeBridge::new(PlatformKind::Android));
    let engine = IntegrityEngine::new(bridge.clone(), Duration::from_millis(50));

    c.bench_function("evaluate_all_verdicts (clean fake)", |b| {
        b.iter(|| {
            for verdict in Verdict::ALL {
                black_box(engine.evaluate(black_box(verdict)));
            }
            // The fake logs every call; keep the log from growing unbounded.
            bridge.update(|s| s.calls.clear());
        });
    });
}

criterion_group!(
    benches,
    bench_envelope_roundtrip,
    bench_envelope_decrypt_reject,
    bench_evaluate_all
);
criterion_main!(benches);
