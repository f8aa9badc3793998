// ABOUTME: Criterion benchmarks for the fixed-window rate limiter
// ABOUTME: Measures per-request check latency for hot clients, many clients, and a full LRU
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Criterion benchmarks for the rate limiter hot path.

#![allow(
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    missing_docs
)]

use atelier_server::config::{RateLimitConfig, RouteLimit};
use atelier_server::rate_limiting::FixedWindowRateLimiter;
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn limiter(max_tracked_clients: usize) -> FixedWindowRateLimiter {
    let route_limits = [
        ("/api/chat", 20),
        ("/api/auth", 10),
        ("/api/generate-website", 5),
        ("/api/payments", 10),
    ]
    .into_iter()
    .map(|(prefix, limit)| RouteLimit {
        prefix: prefix.to_owned(),
        limit,
    })
    .collect();

    FixedWindowRateLimiter::new(&RateLimitConfig {
        window_secs: 60,
        default_limit: 100,
        route_limits,
        max_tracked_clients,
        trust_proxy_headers: false,
    })
}

fn bench_single_client(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit_single_client");
    group.throughput(Throughput::Elements(1));

    let limiter = limiter(10_000);
    let now = Utc::now();
    group.bench_function("chat", |b| {
        b.iter(|| black_box(limiter.check_at(black_box("203.0.113.7"), "/api/chat", now)));
    });
    group.bench_function("fallback_route", |b| {
        b.iter(|| black_box(limiter.check_at(black_box("203.0.113.7"), "/api/health", now)));
    });

    group.finish();
}

fn bench_many_clients(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit_many_clients");

    for clients in [100_usize, 10_000, 50_000] {
        let addresses: Vec<String> = (0..clients)
            .map(|i| format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff))
            .collect();
        // Capacity below the client count forces evictions on the larger runs
        let limiter = limiter(10_000);
        let now = Utc::now();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(clients), &addresses, |b, addresses| {
            let mut i = 0_usize;
            b.iter(|| {
                let client = &addresses[i % addresses.len()];
                i = i.wrapping_add(1);
                black_box(limiter.check_at(client, "/api/chat", now))
            });
        });
    }

    group.finish();
}

fn bench_route_matching(c: &mut Criterion) {
    let limiter = limiter(10);
    c.bench_function("rate_limit_route_for", |b| {
        b.iter(|| black_box(limiter.route_for(black_box("/api/generate-website/preview"))));
    });
}

criterion_group!(benches, bench_single_client, bench_many_clients, bench_route_matching);
criterion_main!(benches);
