//! Performance benchmarks for the workforce sync engine.
//!
//! Covers the hot paths of a nightly run:
//! - Batch reconciliation of employee rows into a fresh and a warm store
//! - Column mapping and validation of a 1000-row payroll file
//! - A full sync job through the HTTP API against a fixture platform
//!
//! Run with: `cargo bench`
//! HTML reports are generated in `target/criterion/`

use std::sync::Arc;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

use workforce_sync::alerts::OutboxSink;
use workforce_sync::api::{AppState, create_router};
use workforce_sync::config::ConfigLoader;
use workforce_sync::import::Importer;
use workforce_sync::models::{FileKind, RawRow, WriteStrategy};
use workforce_sync::reconcile::{BatchReconciler, EmployeeRow};
use workforce_sync::store::MemoryStore;
use workforce_sync::sync::{ExternalEmployee, ExternalSchedule, FixtureSchedulingApi};

use axum::{body::Body, http::Request};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use tower::ServiceExt;

fn load_config() -> ConfigLoader {
    ConfigLoader::load("./config/default").expect("Failed to load config")
}

fn employee_rows(count: usize) -> Vec<EmployeeRow> {
    (0..count)
        .map(|i| EmployeeRow {
            scheduling_id: Some(format!("E{i:05}")),
            payroll_code: Some(format!("P-{i:05}")),
            display_name: format!("Empleado {i}"),
            centre_code: Some(format!("C{:02}", i % 40)),
            email: None,
            active_from: None,
            active_to: None,
        })
        .collect()
}

fn payroll_file(count: usize) -> (Vec<String>, Vec<RawRow>) {
    let headers = ["Código empleado", "Nombre", "Centro", "Desde", "Hasta", "Horas", "Coste"]
        .map(String::from)
        .to_vec();
    let rows = (0..count)
        .map(|i| {
            RawRow::new()
                .with("Código empleado", format!("P-{i:05}"))
                .with("Nombre", format!("Empleado {i}"))
                .with("Centro", format!("C{:02}", i % 40))
                .with("Desde", "01/03/2025")
                .with("Hasta", "31/03/2025")
                .with("Horas", "160")
                .with("Coste", format!("{},50", 2000 + i % 700))
        })
        .collect();
    (headers, rows)
}

/// Benchmark: reconciling 1000 employees, all inserts and then all updates.
fn bench_reconcile_employees(c: &mut Criterion) {
    let rows = employee_rows(1000);
    let reconciler = BatchReconciler::new(50);

    let mut group = c.benchmark_group("reconcile");
    group.throughput(Throughput::Elements(rows.len() as u64));

    group.bench_function("employees_insert_1000", |b| {
        b.iter_batched(
            MemoryStore::new,
            |store| black_box(reconciler.reconcile(&store, &rows, WriteStrategy::Upsert)),
            BatchSize::SmallInput,
        )
    });

    let warm = MemoryStore::new();
    reconciler.reconcile(&warm, &rows, WriteStrategy::Upsert);
    group.bench_function("employees_update_1000", |b| {
        b.iter(|| black_box(reconciler.reconcile(&warm, &rows, WriteStrategy::Upsert)))
    });

    group.finish();
}

/// Benchmark: mapping and validating a 1000-row payroll file.
fn bench_import_preview(c: &mut Criterion) {
    let config = load_config();
    let importer = Importer::new(
        config.import().clone(),
        Arc::new(MemoryStore::new()),
        BatchReconciler::default(),
    );
    let (headers, rows) = payroll_file(1000);

    let mut group = c.benchmark_group("import");
    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function("payroll_preview_1000", |b| {
        b.iter(|| {
            black_box(
                importer
                    .preview(FileKind::Payroll, &headers, &rows, None)
                    .expect("preview failed"),
            )
        })
    });
    group.finish();
}

/// Benchmark: a full sync of 200 employees with a week of shifts each.
fn bench_full_sync(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let as_of = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();

    let employees: Vec<ExternalEmployee> = (0..200)
        .map(|i| ExternalEmployee {
            id: format!("E{i:04}"),
            name: format!("Empleado {i}"),
            payroll_code: Some(format!("P-{i:04}")),
            site_id: None,
            email: None,
            start_date: None,
            end_date: None,
        })
        .collect();
    let schedules: Vec<ExternalSchedule> = employees
        .iter()
        .flat_map(|employee| {
            (0..7).map(move |day| ExternalSchedule {
                id: format!("{}-{day}", employee.id),
                employee_id: employee.id.clone(),
                site_id: None,
                date: as_of - Duration::days(day),
                hours: Decimal::new(8, 0),
            })
        })
        .collect();
    let api = Arc::new(FixtureSchedulingApi::new(employees, schedules, vec![]));
    let state = AppState::new(load_config(), api, Arc::new(OutboxSink::new()));
    let body = serde_json::json!({"entity": "full", "lookback_days": 7, "as_of": as_of}).to_string();

    let mut group = c.benchmark_group("sync");
    group.sample_size(20);
    group.bench_function("full_sync_200_employees", |b| {
        b.to_async(&rt).iter(|| async {
            let response = create_router(state.clone())
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/sync/jobs?wait=true")
                        .header("Content-Type", "application/json")
                        .body(Body::from(body.clone()))
                        .unwrap(),
                )
                .await
                .unwrap();
            black_box(response)
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_reconcile_employees,
    bench_import_preview,
    bench_full_sync
);
criterion_main!(benches);
