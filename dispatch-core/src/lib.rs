//! Single-driver ride-dispatch and escrow ledger
//!
//! One operator advertises availability; riders submit trip requests with
//! an attached partial payment; the operator accepts at most one active
//! trip at a time; completion is a two-sided handshake followed by a final
//! payment, after which funds settle and the operator reopens.
//!
//! # Architecture
//!
//! - **Single Owner**: one [`DispatchLedger`] struct owns all mutable state
//! - **Single Writer**: a Tokio actor serializes all access on async hosts
//! - **Escrow Book**: attached funds are custodied until a terminal
//!   transition refunds or disburses them, with an append-only transfer log
//! - **Binary Projection**: the four-phase request lifecycle collapses to
//!   an OPEN/CLOSED view for callers
//!
//! # Invariants
//!
//! - Busy ⇔ exactly one request is accepted or driver-confirmed
//! - Escrow conservation: Σ(collected) == Σ(held) + Σ(transferred)
//! - Requests are append-only; ids are sequential and never reused
//! - Closed is terminal: no lifecycle operation reopens a request

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod metrics;
pub mod types;

// Re-exports
pub use actor::{spawn_dispatch_actor, DispatchHandle};
pub use config::Config;
pub use error::{Error, Result};
pub use escrow::{EscrowBook, Transfer, TransferKind};
pub use ledger::DispatchLedger;
pub use metrics::Metrics;
pub use types::{AccountId, DriverStatus, GeoPoint, Request, RequestStatus};
