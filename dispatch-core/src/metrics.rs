//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the dispatch ledger:
//!
//! - `dispatch_requests_submitted_total` - Requests admitted
//! - `dispatch_requests_accepted_total` - Requests accepted by the operator
//! - `dispatch_requests_retracted_total` - Requests retracted by riders
//! - `dispatch_requests_cancelled_total` - Requests cancelled after acceptance
//! - `dispatch_requests_completed_total` - Requests completed and settled
//! - `dispatch_calls_rejected_total` - Calls that failed validation
//! - `dispatch_escrow_held` - Funds currently custodied

use prometheus::{Gauge, IntCounter, Registry};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Metrics collector
///
/// Counters are registered into a collector-owned registry rather than the
/// process-global default one, so multiple ledgers can coexist in one
/// process (and one test binary).
#[derive(Clone)]
pub struct Metrics {
    /// Requests admitted
    pub requests_submitted: IntCounter,

    /// Requests accepted
    pub requests_accepted: IntCounter,

    /// Requests retracted
    pub requests_retracted: IntCounter,

    /// Requests cancelled
    pub requests_cancelled: IntCounter,

    /// Requests completed
    pub requests_completed: IntCounter,

    /// Rejected calls
    pub calls_rejected: IntCounter,

    /// Funds currently held in escrow
    pub escrow_held: Gauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let requests_submitted = IntCounter::new(
            "dispatch_requests_submitted_total",
            "Requests admitted",
        )?;
        registry.register(Box::new(requests_submitted.clone()))?;

        let requests_accepted = IntCounter::new(
            "dispatch_requests_accepted_total",
            "Requests accepted by the operator",
        )?;
        registry.register(Box::new(requests_accepted.clone()))?;

        let requests_retracted = IntCounter::new(
            "dispatch_requests_retracted_total",
            "Requests retracted by riders",
        )?;
        registry.register(Box::new(requests_retracted.clone()))?;

        let requests_cancelled = IntCounter::new(
            "dispatch_requests_cancelled_total",
            "Requests cancelled after acceptance",
        )?;
        registry.register(Box::new(requests_cancelled.clone()))?;

        let requests_completed = IntCounter::new(
            "dispatch_requests_completed_total",
            "Requests completed and settled",
        )?;
        registry.register(Box::new(requests_completed.clone()))?;

        let calls_rejected = IntCounter::new(
            "dispatch_calls_rejected_total",
            "Calls that failed validation",
        )?;
        registry.register(Box::new(calls_rejected.clone()))?;

        let escrow_held = Gauge::new("dispatch_escrow_held", "Funds currently custodied")?;
        registry.register(Box::new(escrow_held.clone()))?;

        Ok(Self {
            requests_submitted,
            requests_accepted,
            requests_retracted,
            requests_cancelled,
            requests_completed,
            calls_rejected,
            escrow_held,
            registry,
        })
    }

    /// Update the escrowed-funds gauge
    pub fn set_escrow_held(&self, held: Decimal) {
        self.escrow_held.set(held.to_f64().unwrap_or(f64::MAX));
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("requests_submitted", &self.requests_submitted.get())
            .field("requests_accepted", &self.requests_accepted.get())
            .field("requests_retracted", &self.requests_retracted.get())
            .field("requests_cancelled", &self.requests_cancelled.get())
            .field("requests_completed", &self.requests_completed.get())
            .field("calls_rejected", &self.calls_rejected.get())
            .field("escrow_held", &self.escrow_held.get())
            .finish()
    }
}
