pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::bootstrap;
use crate::config::LedgerConfig;
use crate::engine::Ledger;
use crate::health::{HealthMonitor, HealthThresholds};
use crate::store::EventStore;
use crate::store::sqlite::SqliteBackend;

use state::AppState;

/// Open the configured backend and stand the ledger up around it.
pub fn build_ledger(config: &LedgerConfig) -> Result<Arc<Ledger>> {
    let store = match &config.database {
        Some(path) => {
            let backend = SqliteBackend::open(path)
                .with_context(|| format!("opening event store at {}", path.display()))?;
            Arc::new(EventStore::new(Arc::new(backend)))
        }
        None => Arc::new(EventStore::in_memory()),
    };
    Ok(Arc::new(Ledger::new(store, config.settings.clone())))
}

pub async fn serve(config: LedgerConfig) -> Result<()> {
    let ledger = build_ledger(&config)?;

    let primordial = bootstrap::bootstrap(&ledger.store).await?;
    let realm_id = config
        .realm_id
        .clone()
        .unwrap_or_else(|| primordial.realm_id.clone());

    // KPI window: one hour of activity; the 24h supply-change metric has
    // its own fixed window inside the monitor.
    let monitor = Arc::new(HealthMonitor::new(
        ledger.store.clone(),
        HealthThresholds::default(),
        3_600_000,
    ));

    spawn_safety_loop(
        ledger.clone(),
        monitor.clone(),
        Duration::from_secs(config.health_interval_secs),
    );

    let app_state = AppState::new(ledger, monitor, realm_id);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // Liveness
        .route("/health", get(handlers::health::liveness))
        // The universal operation endpoint
        .route("/api/intent", post(handlers::intent::submit_intent))
        // Event access
        .route("/api/events", get(handlers::events::event_stream))
        .route("/api/query", get(handlers::query::query_events))
        // Observability
        .route("/api/health", get(handlers::health::health_report))
        .route("/api/integrity", get(handlers::health::verify_integrity))
        .layer(cors)
        .with_state(app_state);

    let addr = format!("{}:{}", config.host, config.port);
    println!("ubl-core listening on {addr}");
    println!("  Intent:    POST http://{addr}/api/intent");
    println!("  Events:    GET  http://{addr}/api/events");
    println!("  Query:     GET  http://{addr}/api/query");
    println!("  Health:    GET  http://{addr}/api/health");
    println!("  Integrity: GET  http://{addr}/api/integrity");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown_tx = std::sync::Mutex::new(Some(shutdown_tx));
    ctrlc::set_handler(move || {
        if let Ok(mut guard) = shutdown_tx.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(());
            }
        }
    })
    .context("installing ctrl-c handler")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
            println!("shutting down");
        })
        .await
        .context("serving")?;

    Ok(())
}

/// Periodic health sweep: recompute KPIs, feed the breaker, run the rate
/// controller. This path is observability; its own failures are logged and
/// swallowed, never propagated into request handling.
fn spawn_safety_loop(ledger: Arc<Ledger>, monitor: Arc<HealthMonitor>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let report = match monitor.compute().await {
                Ok(report) => report,
                Err(err) => {
                    eprintln!("[health] KPI computation failed: {err}");
                    continue;
                }
            };
            let metrics = report.metrics();
            match ledger.run_safety_check(&metrics).await {
                Ok(Some(trip)) => {
                    eprintln!("[health] circuit breaker tripped: {}", trip.reason);
                }
                Ok(None) => {}
                Err(err) => eprintln!("[health] safety check failed: {err}"),
            }
            if let Err(err) = ledger.evaluate_rates(metrics.inflation).await {
                eprintln!("[health] rate evaluation failed: {err}");
            }
            for alert in &report.alerts {
                eprintln!(
                    "[health] {:?}: {} = {:.4} (threshold {:.4}) — {}",
                    alert.severity, alert.metric, alert.value, alert.threshold, alert.action
                );
            }
        }
    });
}
