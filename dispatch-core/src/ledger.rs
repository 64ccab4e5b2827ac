//! Main dispatch ledger
//!
//! This module ties the driver profile, the request sequence, and the
//! escrow book into a single state machine. Every operation resolves the
//! caller's role first, validates preconditions, then mutates; a failed
//! call commits nothing.
//!
//! # Example
//!
//! ```
//! use dispatch_core::{AccountId, Config, DispatchLedger, GeoPoint};
//! use rust_decimal::Decimal;
//!
//! fn main() -> dispatch_core::Result<()> {
//!     let config = Config {
//!         operator: "driver-1".to_string(),
//!         ..Default::default()
//!     };
//!     let mut ledger = DispatchLedger::new(config)?;
//!
//!     let operator = AccountId::new("driver-1");
//!     ledger.open(&operator)?;
//!
//!     let rider = AccountId::new("rider-1");
//!     let id = ledger.send_request(
//!         &rider,
//!         GeoPoint::new(321, 321),
//!         GeoPoint::new(123, 123),
//!         chrono::Utc::now(),
//!         Decimal::from(10_000),
//!         Decimal::from(1_000),
//!     )?;
//!     assert_eq!(id, 0);
//!
//!     Ok(())
//! }
//! ```

use crate::escrow::EscrowBook;
use crate::metrics::Metrics;
use crate::types::{AccountId, DriverStatus, GeoPoint, Request, RequestPhase, RequestStatus};
use crate::{Config, Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// The single-driver dispatch ledger
///
/// Owns all mutable state: the driver profile, the append-only request
/// sequence, and the escrowed funds. Callers hold only ids and read
/// projections.
#[derive(Debug)]
pub struct DispatchLedger {
    /// Sole account authorized for operator-only actions, fixed at creation
    operator: AccountId,

    /// Driver availability
    status: DriverStatus,

    /// Advertised license plate
    license_plate: String,

    /// Down payment percentage applied to new requests (0-100)
    down_payment_percentage: u8,

    /// Append-only request sequence, indexed by id
    requests: Vec<Request>,

    /// Escrowed funds
    escrow: EscrowBook,

    /// Metrics collector
    metrics: Metrics,
}

impl DispatchLedger {
    /// Create a new ledger from configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            operator: AccountId::new(config.operator),
            status: DriverStatus::Closed,
            license_plate: config.license_plate,
            down_payment_percentage: config.down_payment_percentage,
            requests: Vec::new(),
            escrow: EscrowBook::new(),
            metrics: Metrics::new()?,
        })
    }

    // ---- driver profile ----

    /// Open the driver for new requests (operator only)
    pub fn open(&mut self, caller: &AccountId) -> Result<()> {
        self.require_operator(caller)?;

        self.status = DriverStatus::Open;
        tracing::info!(operator = %caller, "driver opened");
        Ok(())
    }

    /// Close the driver to new requests (operator only)
    ///
    /// An unconditional toggle: closing while busy leaves the in-flight
    /// request untouched, and its terminal transition still reopens the
    /// driver.
    pub fn close(&mut self, caller: &AccountId) -> Result<()> {
        self.require_operator(caller)?;

        self.status = DriverStatus::Closed;
        tracing::info!(operator = %caller, "driver closed");
        Ok(())
    }

    /// Replace the license plate (operator only)
    pub fn change_license_plate(
        &mut self,
        caller: &AccountId,
        plate: impl Into<String>,
    ) -> Result<()> {
        self.require_operator(caller)?;

        self.license_plate = plate.into();
        tracing::info!(plate = %self.license_plate, "license plate changed");
        Ok(())
    }

    /// Change the down payment percentage (operator only)
    ///
    /// Applies to requests created afterwards; existing requests keep the
    /// percentage captured at their creation.
    pub fn change_down_payment_percentage(&mut self, caller: &AccountId, pct: u8) -> Result<()> {
        self.require_operator(caller)?;

        if pct > 100 {
            return Err(self.reject(Error::InvalidArgument(format!(
                "down payment percentage must be within 0-100, got {}",
                pct
            ))));
        }

        self.down_payment_percentage = pct;
        tracing::info!(pct, "down payment percentage changed");
        Ok(())
    }

    /// Current driver status
    pub fn driver_status(&self) -> DriverStatus {
        self.status
    }

    /// Current license plate
    pub fn license_plate(&self) -> &str {
        &self.license_plate
    }

    /// Current down payment percentage
    pub fn down_payment_percentage(&self) -> u8 {
        self.down_payment_percentage
    }

    /// The operator account
    pub fn operator(&self) -> &AccountId {
        &self.operator
    }

    // ---- request lifecycle ----

    /// Submit a trip request with an attached down payment
    ///
    /// Returns the id of the new request. The attached value is escrowed
    /// in full, even when it exceeds the required minimum.
    pub fn send_request(
        &mut self,
        caller: &AccountId,
        origin: GeoPoint,
        destination: GeoPoint,
        pickup_time: DateTime<Utc>,
        amount: Decimal,
        attached: Decimal,
    ) -> Result<u64> {
        if self.status != DriverStatus::Open {
            return Err(self.reject(Error::DriverUnavailable(self.status.as_str().to_string())));
        }

        if origin == destination {
            return Err(self.reject(Error::InvalidRoute));
        }

        let required = self.down_payment_for(amount);

        if amount <= required {
            return Err(self.reject(Error::InvalidArgument(format!(
                "amount {} must exceed the required down payment {}",
                amount, required
            ))));
        }

        if attached < required {
            return Err(self.reject(Error::InsufficientPayment { required, attached }));
        }

        let id = self.requests.len() as u64;
        self.requests.push(Request {
            id,
            rider: caller.clone(),
            origin,
            destination,
            pickup_time,
            amount,
            down_payment_required: required,
            down_payment_held: attached,
            phase: RequestPhase::Open,
        });
        self.escrow.collect(id, attached);

        self.metrics.requests_submitted.inc();
        self.metrics.set_escrow_held(self.escrow.total_held());
        tracing::info!(request_id = id, rider = %caller, %amount, held = %attached, "request submitted");

        Ok(id)
    }

    /// Retract an open request (rider only)
    ///
    /// Refunds the held down payment to the rider.
    pub fn retract_request(&mut self, caller: &AccountId, id: u64) -> Result<()> {
        let request = match self.requests.get(id as usize) {
            Some(r) => r,
            None => return Err(self.reject(Error::NotFound(id))),
        };

        if *caller != request.rider {
            return Err(self.reject(Error::Unauthorized(format!(
                "only the rider may retract request {}",
                id
            ))));
        }

        if request.phase != RequestPhase::Open {
            return Err(self.reject(Error::InvalidState(format!(
                "request {} is not open",
                id
            ))));
        }

        let rider = request.rider.clone();
        self.requests[id as usize].phase = RequestPhase::Closed;
        self.escrow.refund(id, &rider)?;

        self.metrics.requests_retracted.inc();
        self.metrics.set_escrow_held(self.escrow.total_held());
        tracing::info!(request_id = id, rider = %rider, "request retracted");

        Ok(())
    }

    /// Accept an open request (operator only)
    ///
    /// At most one request may be active: accepting requires the driver to
    /// be open, and marks it busy.
    pub fn accept_request(&mut self, caller: &AccountId, id: u64) -> Result<()> {
        self.require_operator(caller)?;

        let request = match self.requests.get(id as usize) {
            Some(r) => r,
            None => return Err(self.reject(Error::NotFound(id))),
        };

        if request.phase != RequestPhase::Open {
            return Err(self.reject(Error::InvalidState(format!(
                "request {} is not open",
                id
            ))));
        }

        if self.status != DriverStatus::Open {
            return Err(self.reject(Error::InvalidState(format!(
                "driver is {}, cannot accept",
                self.status
            ))));
        }

        self.requests[id as usize].phase = RequestPhase::Accepted;
        self.status = DriverStatus::Busy;

        self.metrics.requests_accepted.inc();
        tracing::info!(request_id = id, "request accepted");

        Ok(())
    }

    /// Cancel an accepted request (operator only)
    ///
    /// Refunds the held down payment to the rider and reopens the driver.
    pub fn cancel_request(&mut self, caller: &AccountId, id: u64) -> Result<()> {
        self.require_operator(caller)?;

        let request = match self.requests.get(id as usize) {
            Some(r) => r,
            None => return Err(self.reject(Error::NotFound(id))),
        };

        if !request.phase.is_active() {
            return Err(self.reject(Error::InvalidState(format!(
                "request {} is not accepted",
                id
            ))));
        }

        let rider = request.rider.clone();
        self.requests[id as usize].phase = RequestPhase::Closed;
        self.status = DriverStatus::Open;
        self.escrow.refund(id, &rider)?;

        self.metrics.requests_cancelled.inc();
        self.metrics.set_escrow_held(self.escrow.total_held());
        tracing::info!(request_id = id, rider = %rider, "request cancelled");

        Ok(())
    }

    /// Complete a request via the two-sided handshake
    ///
    /// The operator confirms first with no attached value; the rider then
    /// supplies the exact remainder, which is paid out to the operator
    /// together with the held down payment.
    pub fn finish_request(&mut self, caller: &AccountId, id: u64, attached: Decimal) -> Result<()> {
        let request = match self.requests.get(id as usize) {
            Some(r) => r,
            None => return Err(self.reject(Error::NotFound(id))),
        };

        // A down payment above the full price leaves a negative remainder;
        // never let a negative attachment settle it
        if attached < Decimal::ZERO {
            return Err(self.reject(Error::InvalidArgument(format!(
                "attached value must not be negative, got {}",
                attached
            ))));
        }

        if *caller == self.operator {
            if request.phase != RequestPhase::Accepted {
                return Err(self.reject(Error::InvalidState(format!(
                    "request {} is not awaiting driver confirmation",
                    id
                ))));
            }

            if attached != Decimal::ZERO {
                return Err(self.reject(Error::InvalidState(format!(
                    "driver confirmation must not attach value, got {}",
                    attached
                ))));
            }

            self.requests[id as usize].phase = RequestPhase::DriverConfirmed;
            tracing::info!(request_id = id, "driver confirmed completion");

            return Ok(());
        }

        if *caller != request.rider {
            return Err(self.reject(Error::Unauthorized(format!(
                "only the operator or the rider may finish request {}",
                id
            ))));
        }

        if request.phase != RequestPhase::DriverConfirmed {
            return Err(self.reject(Error::InvalidState(format!(
                "request {} is not awaiting the rider's final payment",
                id
            ))));
        }

        let remainder = request.remainder();
        if attached != remainder {
            return Err(self.reject(Error::InsufficientPayment {
                required: remainder,
                attached,
            }));
        }

        let operator = self.operator.clone();
        self.requests[id as usize].phase = RequestPhase::Closed;
        self.status = DriverStatus::Open;
        self.escrow.collect(id, attached);
        self.escrow.payout(id, &operator)?;

        self.metrics.requests_completed.inc();
        self.metrics.set_escrow_held(self.escrow.total_held());
        tracing::info!(request_id = id, paid = %attached, "request completed, funds settled");

        Ok(())
    }

    // ---- reads ----

    /// Total number of requests ever created
    pub fn num_requests(&self) -> u64 {
        self.requests.len() as u64
    }

    /// Externally observable status of a request
    pub fn request_status(&self, id: u64) -> Result<RequestStatus> {
        self.requests
            .get(id as usize)
            .map(Request::status)
            .ok_or(Error::NotFound(id))
    }

    /// Snapshot of a request
    pub fn request(&self, id: u64) -> Result<Request> {
        self.requests
            .get(id as usize)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    /// Id of the request currently occupying the driver, if any
    pub fn active_request_id(&self) -> Option<u64> {
        self.requests.iter().find(|r| r.phase.is_active()).map(|r| r.id)
    }

    /// Number of requests currently occupying the driver (0 or 1)
    pub fn num_active_requests(&self) -> usize {
        self.requests.iter().filter(|r| r.phase.is_active()).count()
    }

    /// The escrow book
    pub fn escrow(&self) -> &EscrowBook {
        &self.escrow
    }

    /// The metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // ---- helpers ----

    fn require_operator(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.operator {
            return Err(self.reject(Error::Unauthorized(format!(
                "caller {} is not the operator",
                caller
            ))));
        }
        Ok(())
    }

    fn down_payment_for(&self, amount: Decimal) -> Decimal {
        // Truncating division: 15% of 101 is 15, never rounded up
        (amount * Decimal::from(self.down_payment_percentage) / Decimal::from(100u8)).trunc()
    }

    fn reject(&self, err: Error) -> Error {
        self.metrics.calls_rejected.inc();
        tracing::warn!(error = %err, "call rejected");
        err
    }
}
