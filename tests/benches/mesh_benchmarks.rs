//! # Governed Event Mesh Benchmarks
//!
//! | Component | Operation | Target |
//! |-----------|-----------|--------|
//! | mesh-01 Routing | Resolve against a compiled map | < 10µs |
//! | mesh-02 Audit Log | Append (in-memory) | < 100µs |
//! | mesh-02 Audit Log | Verify chain | linear in entries |
//! | mesh-03 Dispatcher | Emit, trusted, audited | < 1ms |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mesh_01_routing_config::{load_str, CatalogueFormat, RoutingMap, RoutingTable};
use mesh_02_audit_log::{AuditConfig, AuditRecord, ImmutableAuditLog};
use mesh_03_dispatcher::{handler_fn, DispatcherConfig, EventDispatcher};
use serde_json::json;
use shared_types::{ComponentId, TriggerEvent};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

/// A catalogue with `n` exact rules plus a handful of wildcard rules.
fn catalogue(n: usize) -> String {
    let mut yaml = String::from("events:\n");
    for i in 0..n {
        yaml.push_str(&format!(
            "  - event_type: domain{}.event{}\n    publishers: [producer_{}]\n    subscribers: [consumer_{}]\n",
            i % 10,
            i,
            i % 7,
            i % 5
        ));
    }
    for d in 0..10 {
        yaml.push_str(&format!(
            "  - event_type: domain{d}.*\n    publishers: [\"*\"]\n    subscribers: [audit_sink]\n"
        ));
    }
    yaml
}

// ============================================================================
// MESH-01: Route resolution
// ============================================================================

fn bench_route_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("mesh-01-routing");

    for size in [10, 100, 1_000] {
        let map: RoutingMap = load_str(&catalogue(size), CatalogueFormat::Yaml).unwrap();
        let source = ComponentId::new("producer_3");
        let exact = format!("domain{}.event{}", 3 % 10, 3);

        group.bench_with_input(BenchmarkId::new("resolve_exact", size), &size, |b, _| {
            b.iter(|| black_box(map.resolve(&source, &exact)))
        });
        group.bench_with_input(BenchmarkId::new("resolve_wildcard", size), &size, |b, _| {
            b.iter(|| black_box(map.resolve(&source, "domain4.unlisted")))
        });
    }

    group.bench_function("compile_1000_rules", |b| {
        let text = catalogue(1_000);
        b.iter(|| black_box(load_str(&text, CatalogueFormat::Yaml).unwrap()))
    });

    group.finish();
}

// ============================================================================
// MESH-02: Audit ledger
// ============================================================================

fn bench_audit_append(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("mesh-02-audit-log");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(1));

    let ledger = ImmutableAuditLog::new_in_memory(AuditConfig::default());
    group.bench_function("append_in_memory", |b| {
        b.to_async(&rt).iter(|| async {
            let record = AuditRecord::new("agent", "policy.evaluated", "policy/1", "governance")
                .with_payload(json!({ "decision": "allow" }));
            black_box(ledger.append(record).await.unwrap())
        })
    });

    let dir = tempfile::tempdir().unwrap();
    let store =
        mesh_02_audit_log::JsonLinesLedgerStore::open(dir.path().join("ledger.jsonl"), false)
            .unwrap();
    let file_ledger = ImmutableAuditLog::open(store, AuditConfig::default()).unwrap();
    group.bench_function("append_file_no_fsync", |b| {
        b.to_async(&rt).iter(|| async {
            let record = AuditRecord::new("agent", "policy.evaluated", "policy/1", "governance");
            black_box(file_ledger.append(record).await.unwrap())
        })
    });

    for size in [100u64, 1_000, 10_000] {
        let ledger = ImmutableAuditLog::new_in_memory(AuditConfig::default());
        rt.block_on(async {
            for i in 0..size {
                let record = AuditRecord::new("agent", "policy.evaluated", format!("policy/{i}"), "governance");
                ledger.append(record).await.unwrap();
            }
        });
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::new("verify_chain", size), &size, |b, _| {
            b.iter(|| black_box(ledger.verify_integrity().valid))
        });
    }

    group.finish();
}

// ============================================================================
// MESH-03: Dispatch
// ============================================================================

fn bench_emit(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("mesh-03-dispatcher");

    let map = load_str(
        r#"
events:
  - event_type: governance.policy_violation
    publishers: [governance_engine]
    subscribers: [alert_system, immutable_log]
    min_trust_score: 0.9
    audit_required: true
  - event_type: chat.message
    publishers: [chat]
    subscribers: [archive]
"#,
        CatalogueFormat::Yaml,
    )
    .unwrap();

    let routing = Arc::new(RoutingTable::new());
    routing.install(map);
    let ledger = Arc::new(ImmutableAuditLog::new_in_memory(AuditConfig::default()));
    let dispatcher = EventDispatcher::with_routing(
        DispatcherConfig::default().with_trust_fallback(true),
        routing,
        ledger,
    );
    for component in ["alert_system", "immutable_log", "archive"] {
        dispatcher.register_component_handler(component, handler_fn(|_event: TriggerEvent| async { Ok(()) }));
    }
    rt.block_on(async { dispatcher.start().unwrap() });

    group.bench_function("emit_unaudited", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                dispatcher
                    .emit(TriggerEvent::new("chat.message", "chat", "alice"))
                    .await,
            )
        })
    });

    group.bench_function("emit_trusted_audited", |b| {
        b.to_async(&rt).iter(|| async {
            let event =
                TriggerEvent::new("governance.policy_violation", "governance_engine", "agent")
                    .with_trust_score(0.95);
            black_box(dispatcher.emit(event).await)
        })
    });

    group.bench_function("emit_blocked", |b| {
        b.to_async(&rt).iter(|| async {
            let event =
                TriggerEvent::new("governance.policy_violation", "governance_engine", "agent")
                    .with_trust_score(0.1);
            black_box(dispatcher.emit(event).await)
        })
    });

    rt.block_on(dispatcher.stop());
    group.finish();
}

criterion_group!(benches, bench_route_resolution, bench_audit_append, bench_emit);
criterion_main!(benches);
