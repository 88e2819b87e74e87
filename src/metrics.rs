// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the IPFS operator.
//!
//! This module provides metrics collection with the namespace prefix
//! `ipfs_operator_`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Track reconciliation passes and their outcomes
//! - **Child Resource Metrics** - Track what create-or-patch did per child kind
//! - **Identity Metrics** - Track whether identities were generated or reused
//! - **Error Metrics** - Track error conditions by operation
//!
//! # Example
//!
//! ```rust,no_run
//! use ipfs_operator::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success(std::time::Duration::from_millis(250));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all operator metrics
const METRICS_NAMESPACE: &str = "ipfs_operator";

/// Resource type label for the reconciled kind
const RESOURCE_TYPE_IPFS: &str = "Ipfs";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliation passes by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (`Ipfs`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliation passes in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of requeue requests
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `reason`: Reason for requeue (`finalizer`, `identity`, `child`)
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by resource type and reason",
    );
    let counter = CounterVec::new(opts, &["resource_type", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Child Resource Metrics
// ============================================================================

/// Total number of child create-or-patch calls by outcome
///
/// Labels:
/// - `kind`: Child kind (`StatefulSet`, `Service`, ...)
/// - `outcome`: `created`, `patched`, `unchanged` or `failed`
pub static CHILD_APPLIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_child_applies_total"),
        "Total number of child resource applies by kind and outcome",
    );
    let counter = CounterVec::new(opts, &["kind", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Identity Metrics
// ============================================================================

/// Total number of identities generated or reused
///
/// Labels:
/// - `source`: `generated` or `persisted`
pub static IDENTITIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_identities_total"),
        "Total number of cluster identities by source",
    );
    let counter = CounterVec::new(opts, &["source"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by operation and error category
///
/// Labels:
/// - `operation`: What failed (`get`, `finalizer`, `identity`, `apply`)
/// - `error_type`: Category of error (`conflict`, `transport`, `api`, ...)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by operation and error category",
    );
    let counter = CounterVec::new(opts, &["operation", "error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a reconciliation pass that completed without asking for a requeue
pub fn record_reconciliation_success(duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[RESOURCE_TYPE_IPFS, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[RESOURCE_TYPE_IPFS])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation pass that returned an error
pub fn record_reconciliation_error(duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[RESOURCE_TYPE_IPFS, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[RESOURCE_TYPE_IPFS])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation pass that asked to be re-run
///
/// # Arguments
/// * `reason` - Reason for requeue (e.g., `child`, `finalizer`)
/// * `duration` - Duration of the pass
pub fn record_reconciliation_requeue(reason: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[RESOURCE_TYPE_IPFS, "requeue"])
        .inc();
    REQUEUE_TOTAL
        .with_label_values(&[RESOURCE_TYPE_IPFS, reason])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[RESOURCE_TYPE_IPFS])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of one child create-or-patch
pub fn record_child_apply(kind: &str, outcome: &str) {
    CHILD_APPLIES_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
}

/// Record where a pass took its identity from
pub fn record_identity(source: &str) {
    IDENTITIES_TOTAL.with_label_values(&[source]).inc();
}

/// Record an error
///
/// # Arguments
/// * `operation` - What the engine was doing
/// * `error_type` - Category of error (see `StoreError::kind_label`)
pub fn record_error(operation: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[operation, error_type])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
