use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use chrono::{Duration, Utc};

use campusgate_abuse::{AbuseEngine, InMemoryAbuseStore};
use campusgate_access::{RequestGate, RouteRule, RouteTable, decide, landing_route};
use campusgate_audit::{ClientMeta, TracingAuditSink};
use campusgate_auth::{IdentityClaims, Role, SessionContext, TokenConfig, TokenService};
use campusgate_core::{TenantId, UserId};
use campusgate_tenancy::{ContextResolver, InMemoryDirectory, Tenant};

fn settled_context(role: Role) -> SessionContext {
    let tenant = TenantId::new();
    SessionContext {
        user_id: UserId::new(),
        role,
        tenant_ids: vec![tenant],
        active_tenant_id: Some(tenant),
        active_dependent_id: None,
        dependents: Vec::new(),
        permissions: Vec::new(),
        onboarding_complete: true,
        needs_tenant_selection: false,
        needs_dependent_selection: false,
    }
}

fn bench_decision_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("decision_latency");
    group.sample_size(1000);

    let table = RouteTable::default_platform();

    // Benchmark: the common case, a granted tenant-scoped route
    group.bench_function("granted_protected_route", |b| {
        let ctx = settled_context(Role::Teacher);
        b.iter(|| black_box(decide(&table, black_box("/teacher/classes"), &ctx)));
    });

    // Benchmark: public short-circuit (cheapest path)
    group.bench_function("public_route", |b| {
        let ctx = settled_context(Role::Student);
        b.iter(|| black_box(decide(&table, black_box("/login"), &ctx)));
    });

    // Benchmark: denial with the full check ladder walked
    group.bench_function("role_mismatch_denial", |b| {
        let ctx = settled_context(Role::Student);
        b.iter(|| black_box(decide(&table, black_box("/admin/settings"), &ctx)));
    });

    group.finish();
}

fn bench_route_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_classification");
    group.throughput(Throughput::Elements(1));

    // Classification is a linear scan; measure how it scales with table
    // size by always matching the last rule.
    for table_size in [10usize, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("match_last_rule", table_size),
            table_size,
            |b, &size| {
                let mut table = RouteTable::new();
                for i in 0..size {
                    table.add_rule(RouteRule::new(
                        &format!("/section{i}/:id/detail"),
                        [Role::Teacher],
                    ));
                }
                let path = format!("/section{}/42/detail", size - 1);

                b.iter(|| black_box(table.classify(black_box(&path))));
            },
        );
    }

    group.finish();
}

fn bench_landing_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("landing_walk");
    group.sample_size(1000);

    let table = RouteTable::default_platform();

    group.bench_function("primary_hit", |b| {
        let ctx = settled_context(Role::SchoolAdmin);
        b.iter(|| black_box(landing_route(&table, &ctx)));
    });

    // An un-onboarded admin walks past /admin and /admin/staff to /profile.
    group.bench_function("fallback_walk", |b| {
        let mut ctx = settled_context(Role::SchoolAdmin);
        ctx.onboarding_complete = false;
        b.iter(|| black_box(landing_route(&table, &ctx)));
    });

    group.finish();
}

fn bench_gate_authorization(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate_authorization");
    group.sample_size(1000);

    let config = TokenConfig::new("bench-secret", Duration::minutes(30));
    let directory = Arc::new(InMemoryDirectory::new());
    let gate = RequestGate::new(
        TokenService::new(&config),
        ContextResolver::new(Arc::clone(&directory)),
        AbuseEngine::new(InMemoryAbuseStore::arc()),
        TracingAuditSink::new(),
        RouteTable::default_platform(),
    );

    let tenant = TenantId::new();
    directory.upsert_tenant(Tenant::new(tenant, "Bench School"));
    let claims = IdentityClaims::new(
        UserId::new(),
        Role::Teacher,
        vec![tenant],
        Vec::new(),
        Utc::now(),
        Duration::minutes(30),
    )
    .with_active_tenant(tenant);
    directory.set_onboarded(claims.sub, tenant, true);
    let token = gate
        .tokens()
        .issue(&claims)
        .expect("bench claims sign cleanly");
    let client = ClientMeta::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 50)), "bench-client");

    // Benchmark: full pipeline with verification, resolution, and audit
    group.bench_function("granted_end_to_end", |b| {
        b.iter(|| black_box(gate.authorize(Some(&token), black_box("/teacher"), &client, None)));
    });

    // Benchmark: anonymous public request (blocklist + classify only)
    group.bench_function("public_end_to_end", |b| {
        b.iter(|| black_box(gate.authorize(None, black_box("/login"), &client, None)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_decision_latency,
    bench_route_classification,
    bench_landing_walk,
    bench_gate_authorization
);
criterion_main!(benches);
