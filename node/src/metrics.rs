//! # Prometheus Metrics
//!
//! Operational metrics for the engine harness. Scraped by Prometheus at
//! `/metrics` in `run` mode, printed on request after `replay`.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] with the `zdag`
//! prefix so they do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use zdag_protocol::mempool::PoolStats;

/// Holds all Prometheus metric handles for the harness.
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,
    /// Successful admissions, by outcome (`broadcast`, `local_only`,
    /// `already_known`).
    pub admissions_total: IntCounterVec,
    /// Refused admissions, by reason.
    pub rejections_total: IntCounterVec,
    /// Admissions that landed in a conflict set.
    pub conflicts_detected_total: IntCounter,
    /// Classification results, by status.
    pub classifications_total: IntCounterVec,
    /// Blocks connected.
    pub blocks_connected_total: IntCounter,
    /// Blocks disconnected.
    pub blocks_disconnected_total: IntCounter,
    /// Pool transactions evicted (conflict losers, sweeps, expiry).
    pub evictions_total: IntCounter,
    /// Current pending pool size.
    pub pool_transactions: IntGauge,
    /// Current number of live conflict sets.
    pub conflict_sets: IntGauge,
    /// Height of the last connected block.
    pub tip_height: IntGauge,
    /// Time spent in a single classification, in seconds.
    pub classify_latency_seconds: Histogram,
}

fn register<M>(registry: &Registry, metric: M) -> Result<M, prometheus::Error>
where
    M: prometheus::core::Collector + Clone + 'static,
{
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

impl EngineMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("zdag".into()), None)?;

        let admissions_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("admissions_total", "Transactions admitted to the pool"),
                &["outcome"],
            )?,
        )?;
        let rejections_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("rejections_total", "Transactions refused by admission"),
                &["reason"],
            )?,
        )?;
        let conflicts_detected_total = register(
            &registry,
            IntCounter::new(
                "conflicts_detected_total",
                "Admissions that joined or created a conflict set",
            )?,
        )?;
        let classifications_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("classifications_total", "Classification results"),
                &["status"],
            )?,
        )?;
        let blocks_connected_total = register(
            &registry,
            IntCounter::new("blocks_connected_total", "Blocks connected")?,
        )?;
        let blocks_disconnected_total = register(
            &registry,
            IntCounter::new("blocks_disconnected_total", "Blocks disconnected")?,
        )?;
        let evictions_total = register(
            &registry,
            IntCounter::new("evictions_total", "Pending transactions evicted")?,
        )?;
        let pool_transactions = register(
            &registry,
            IntGauge::new("pool_transactions", "Pending transactions in the pool")?,
        )?;
        let conflict_sets = register(
            &registry,
            IntGauge::new("conflict_sets", "Live conflict sets")?,
        )?;
        let tip_height = register(
            &registry,
            IntGauge::new("tip_height", "Height of the last connected block")?,
        )?;
        let classify_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "classify_latency_seconds",
                    "Time spent classifying a single transaction",
                )
                .buckets(vec![
                    0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005,
                    0.01, 0.05,
                ]),
            )?,
        )?;

        Ok(Self {
            registry,
            admissions_total,
            rejections_total,
            conflicts_detected_total,
            classifications_total,
            blocks_connected_total,
            blocks_disconnected_total,
            evictions_total,
            pool_transactions,
            conflict_sets,
            tip_height,
            classify_latency_seconds,
        })
    }

    /// Copies pool counters into the gauges.
    pub fn observe_pool(&self, stats: &PoolStats) {
        self.pool_transactions.set(stats.transactions as i64);
        self.conflict_sets.set(stats.conflict_sets as i64);
        if let Some(height) = stats.tip_height {
            self.tip_height.set(height as i64);
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<EngineMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

/// Router serving `/metrics`.
pub fn router(metrics: SharedMetrics) -> axum::Router {
    axum::Router::new()
        .route("/metrics", axum::routing::get(metrics_handler))
        .with_state(metrics)
}
