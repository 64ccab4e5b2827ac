//! Core types for the dispatch ledger
//!
//! All types are designed for:
//! - Deterministic serialization (serde)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier supplied by the hosting transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed-point coordinate pair
///
/// Coordinates are opaque to the ledger: they are compared for equality
/// when admitting a request and never interpreted otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude (fixed-point)
    pub lat: i64,
    /// Longitude (fixed-point)
    pub lng: i64,
}

impl GeoPoint {
    /// Create new point
    pub fn new(lat: i64, lng: i64) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lng)
    }
}

/// Driver availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverStatus {
    /// Not accepting requests (initial state)
    Closed,
    /// Accepting requests
    Open,
    /// Exactly one request is accepted or driver-confirmed
    Busy,
}

impl DriverStatus {
    /// Status label as exposed to callers
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Closed => "CLOSED",
            DriverStatus::Open => "OPEN",
            DriverStatus::Busy => "BUSY",
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Internal request lifecycle phase
///
/// Transitions are monotonic: `Open → Accepted → DriverConfirmed → Closed`,
/// with `Open → Closed` (retraction) and `Accepted → Closed` (cancellation)
/// as shortcuts. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum RequestPhase {
    /// Submitted, awaiting acceptance
    Open,
    /// Accepted by the operator
    Accepted,
    /// Operator confirmed completion, awaiting rider's final payment
    DriverConfirmed,
    /// Terminal: retracted, cancelled, or completed
    Closed,
}

impl RequestPhase {
    /// Collapse to the externally observable status
    pub(crate) fn status(self) -> RequestStatus {
        match self {
            RequestPhase::Open | RequestPhase::Accepted | RequestPhase::DriverConfirmed => {
                RequestStatus::Open
            }
            RequestPhase::Closed => RequestStatus::Closed,
        }
    }

    /// Whether this phase counts against the driver's exclusivity slot
    pub(crate) fn is_active(self) -> bool {
        matches!(self, RequestPhase::Accepted | RequestPhase::DriverConfirmed)
    }
}

/// Externally observable request status
///
/// The fine-grained [`RequestPhase`] is internal bookkeeping; callers only
/// ever observe this binary projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Submitted, accepted, or driver-confirmed
    Open,
    /// Terminal
    Closed,
}

impl RequestStatus {
    /// Status label as exposed to callers
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Open => "OPEN",
            RequestStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A trip request with its escrow state
///
/// Identity (`id`, `rider`, route, `amount`) is fixed at creation; only the
/// phase changes afterwards, and only through the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Sequential zero-based index, never reused
    pub(crate) id: u64,

    /// Caller that created the request
    pub(crate) rider: AccountId,

    /// Trip origin
    pub(crate) origin: GeoPoint,

    /// Trip destination
    pub(crate) destination: GeoPoint,

    /// Requested pickup time (accepted as given)
    pub(crate) pickup_time: DateTime<Utc>,

    /// Total trip price, fixed at creation
    pub(crate) amount: Decimal,

    /// Minimum down payment, computed once from the percentage in force
    /// at creation time
    pub(crate) down_payment_required: Decimal,

    /// Value actually attached and escrowed at creation
    pub(crate) down_payment_held: Decimal,

    /// Internal lifecycle phase
    pub(crate) phase: RequestPhase,
}

impl Request {
    /// Request id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Rider that created the request
    pub fn rider(&self) -> &AccountId {
        &self.rider
    }

    /// Trip origin
    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Trip destination
    pub fn destination(&self) -> GeoPoint {
        self.destination
    }

    /// Requested pickup time
    pub fn pickup_time(&self) -> DateTime<Utc> {
        self.pickup_time
    }

    /// Total trip price
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Minimum down payment required at creation
    pub fn down_payment_required(&self) -> Decimal {
        self.down_payment_required
    }

    /// Down payment actually held in escrow
    pub fn down_payment_held(&self) -> Decimal {
        self.down_payment_held
    }

    /// Final payment still owed on completion
    pub fn remainder(&self) -> Decimal {
        self.amount - self.down_payment_held
    }

    /// Externally observable status
    pub fn status(&self) -> RequestStatus {
        self.phase.status()
    }

    /// Check if the request is in its terminal state
    pub fn is_terminal(&self) -> bool {
        self.phase == RequestPhase::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_phase(phase: RequestPhase) -> Request {
        Request {
            id: 0,
            rider: AccountId::new("rider-1"),
            origin: GeoPoint::new(321, 321),
            destination: GeoPoint::new(123, 123),
            pickup_time: Utc::now(),
            amount: Decimal::from(10_000),
            down_payment_required: Decimal::from(1_000),
            down_payment_held: Decimal::from(1_000),
            phase,
        }
    }

    #[test]
    fn test_status_projection_collapses_phases() {
        assert_eq!(request_with_phase(RequestPhase::Open).status(), RequestStatus::Open);
        assert_eq!(
            request_with_phase(RequestPhase::Accepted).status(),
            RequestStatus::Open
        );
        assert_eq!(
            request_with_phase(RequestPhase::DriverConfirmed).status(),
            RequestStatus::Open
        );
        assert_eq!(
            request_with_phase(RequestPhase::Closed).status(),
            RequestStatus::Closed
        );
    }

    #[test]
    fn test_active_phases() {
        assert!(!RequestPhase::Open.is_active());
        assert!(RequestPhase::Accepted.is_active());
        assert!(RequestPhase::DriverConfirmed.is_active());
        assert!(!RequestPhase::Closed.is_active());
    }

    #[test]
    fn test_terminal() {
        assert!(!request_with_phase(RequestPhase::DriverConfirmed).is_terminal());
        assert!(request_with_phase(RequestPhase::Closed).is_terminal());
    }

    #[test]
    fn test_remainder() {
        let request = request_with_phase(RequestPhase::Accepted);
        assert_eq!(request.remainder(), Decimal::from(9_000));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(DriverStatus::Closed.as_str(), "CLOSED");
        assert_eq!(DriverStatus::Open.as_str(), "OPEN");
        assert_eq!(DriverStatus::Busy.as_str(), "BUSY");
        assert_eq!(RequestStatus::Open.as_str(), "OPEN");
        assert_eq!(RequestStatus::Closed.as_str(), "CLOSED");
    }
}
