//! Escrow accounting for request funds
//!
//! The ledger custodies every value attached to a call until a terminal
//! transition releases it: refunded to the rider on retraction or
//! cancellation, paid out to the operator on completion. The book keeps an
//! append-only transfer log so releases stay observable after the fact.

use crate::types::AccountId;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction of an escrow release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    /// Held funds returned to the rider
    Refund,
    /// Held funds plus final payment disbursed to the operator
    Payout,
}

/// A single escrow release, recorded append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    /// Request the funds belonged to
    pub request_id: u64,
    /// Account the funds were released to
    pub beneficiary: AccountId,
    /// Released amount
    pub amount: Decimal,
    /// Refund or payout
    pub kind: TransferKind,
    /// Release timestamp
    pub at: DateTime<Utc>,
}

/// Escrow book: funds held per request plus the release log
///
/// Conservation invariant: everything ever collected is either still held
/// or accounted for by a logged transfer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscrowBook {
    /// Funds currently custodied, keyed by request id
    held: BTreeMap<u64, Decimal>,

    /// Append-only log of releases
    transfers: Vec<Transfer>,

    /// Total value ever collected
    total_collected: Decimal,
}

impl EscrowBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Take custody of an attached value for a request
    pub fn collect(&mut self, request_id: u64, amount: Decimal) {
        *self.held.entry(request_id).or_insert(Decimal::ZERO) += amount;
        self.total_collected += amount;
    }

    /// Funds currently held for a request
    pub fn held(&self, request_id: u64) -> Decimal {
        self.held.get(&request_id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Release everything held for a request back to the rider
    pub fn refund(&mut self, request_id: u64, beneficiary: &AccountId) -> Result<Transfer> {
        self.release(request_id, beneficiary, TransferKind::Refund)
    }

    /// Disburse everything held for a request to the operator
    pub fn payout(&mut self, request_id: u64, beneficiary: &AccountId) -> Result<Transfer> {
        self.release(request_id, beneficiary, TransferKind::Payout)
    }

    fn release(
        &mut self,
        request_id: u64,
        beneficiary: &AccountId,
        kind: TransferKind,
    ) -> Result<Transfer> {
        let amount = self.held.remove(&request_id).ok_or_else(|| {
            Error::InvalidState(format!("no funds held for request {}", request_id))
        })?;

        let transfer = Transfer {
            request_id,
            beneficiary: beneficiary.clone(),
            amount,
            kind,
            at: Utc::now(),
        };
        self.transfers.push(transfer.clone());

        Ok(transfer)
    }

    /// Full release log
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Total funds currently held across all requests
    pub fn total_held(&self) -> Decimal {
        self.held.values().copied().sum()
    }

    /// Total funds released across all requests
    pub fn total_transferred(&self) -> Decimal {
        self.transfers.iter().map(|t| t.amount).sum()
    }

    /// Check the conservation invariant
    ///
    /// Σ(collected) == Σ(held) + Σ(transferred) for all time.
    pub fn check_conservation(&self) -> bool {
        self.total_collected == self.total_held() + self.total_transferred()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_and_hold() {
        let mut book = EscrowBook::new();
        book.collect(0, Decimal::from(1_000));

        assert_eq!(book.held(0), Decimal::from(1_000));
        assert_eq!(book.held(1), Decimal::ZERO);
        assert!(book.check_conservation());
    }

    #[test]
    fn test_collect_accumulates() {
        let mut book = EscrowBook::new();
        book.collect(0, Decimal::from(1_000));
        book.collect(0, Decimal::from(9_000));

        assert_eq!(book.held(0), Decimal::from(10_000));
    }

    #[test]
    fn test_refund_releases_everything() {
        let rider = AccountId::new("rider-1");
        let mut book = EscrowBook::new();
        book.collect(0, Decimal::from(1_000));

        let transfer = book.refund(0, &rider).unwrap();
        assert_eq!(transfer.kind, TransferKind::Refund);
        assert_eq!(transfer.amount, Decimal::from(1_000));
        assert_eq!(transfer.beneficiary, rider);

        assert_eq!(book.held(0), Decimal::ZERO);
        assert!(book.check_conservation());
    }

    #[test]
    fn test_payout_includes_final_payment() {
        let operator = AccountId::new("driver-1");
        let mut book = EscrowBook::new();
        book.collect(0, Decimal::from(1_000));
        book.collect(0, Decimal::from(9_000));

        let transfer = book.payout(0, &operator).unwrap();
        assert_eq!(transfer.kind, TransferKind::Payout);
        assert_eq!(transfer.amount, Decimal::from(10_000));

        assert_eq!(book.total_held(), Decimal::ZERO);
        assert_eq!(book.total_transferred(), Decimal::from(10_000));
        assert!(book.check_conservation());
    }

    #[test]
    fn test_double_release_fails() {
        let rider = AccountId::new("rider-1");
        let mut book = EscrowBook::new();
        book.collect(0, Decimal::from(1_000));

        book.refund(0, &rider).unwrap();
        assert!(book.refund(0, &rider).is_err());
        assert!(book.check_conservation());
    }
}
