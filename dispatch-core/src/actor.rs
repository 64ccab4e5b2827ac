//! Actor-based concurrency for the dispatch ledger
//!
//! The ledger requires a total ordering of operations: a later-arriving
//! acceptance must see the effects of an earlier submission, with no
//! interleaving of partial mutation. On a multi-threaded host that
//! guarantee comes from the single-writer pattern implemented here: one
//! Tokio task owns the [`DispatchLedger`] and processes commands from a
//! bounded mailbox one at a time, replying over oneshot channels. The
//! clone-able [`DispatchHandle`] is the only way in.

use crate::ledger::DispatchLedger;
use crate::types::{AccountId, DriverStatus, GeoPoint, Request, RequestStatus};
use crate::{Config, Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the dispatch actor
#[derive(Debug)]
pub enum DispatchCommand {
    /// Open the driver for requests
    Open {
        caller: AccountId,
        response: oneshot::Sender<Result<()>>,
    },

    /// Close the driver to requests
    Close {
        caller: AccountId,
        response: oneshot::Sender<Result<()>>,
    },

    /// Replace the license plate
    ChangeLicensePlate {
        caller: AccountId,
        plate: String,
        response: oneshot::Sender<Result<()>>,
    },

    /// Change the down payment percentage
    ChangeDownPaymentPercentage {
        caller: AccountId,
        pct: u8,
        response: oneshot::Sender<Result<()>>,
    },

    /// Submit a trip request
    SendRequest {
        caller: AccountId,
        origin: GeoPoint,
        destination: GeoPoint,
        pickup_time: DateTime<Utc>,
        amount: Decimal,
        attached: Decimal,
        response: oneshot::Sender<Result<u64>>,
    },

    /// Retract an open request
    RetractRequest {
        caller: AccountId,
        id: u64,
        response: oneshot::Sender<Result<()>>,
    },

    /// Accept an open request
    AcceptRequest {
        caller: AccountId,
        id: u64,
        response: oneshot::Sender<Result<()>>,
    },

    /// Cancel an accepted request
    CancelRequest {
        caller: AccountId,
        id: u64,
        response: oneshot::Sender<Result<()>>,
    },

    /// Advance the completion handshake
    FinishRequest {
        caller: AccountId,
        id: u64,
        attached: Decimal,
        response: oneshot::Sender<Result<()>>,
    },

    /// Read the driver status
    GetDriverStatus {
        response: oneshot::Sender<DriverStatus>,
    },

    /// Read the license plate
    GetLicensePlate {
        response: oneshot::Sender<String>,
    },

    /// Read the down payment percentage
    GetDownPaymentPercentage {
        response: oneshot::Sender<u8>,
    },

    /// Read the total request count
    GetNumRequests {
        response: oneshot::Sender<u64>,
    },

    /// Read the collapsed status of a request
    GetRequestStatus {
        id: u64,
        response: oneshot::Sender<Result<RequestStatus>>,
    },

    /// Read a full request snapshot
    GetRequest {
        id: u64,
        response: oneshot::Sender<Result<Request>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the ledger and serializes all access to it
#[derive(Debug)]
pub struct DispatchActor {
    /// Exclusively owned ledger state
    ledger: DispatchLedger,

    /// Mailbox for incoming commands
    mailbox: mpsc::Receiver<DispatchCommand>,
}

impl DispatchActor {
    /// Create new actor
    pub fn new(ledger: DispatchLedger, mailbox: mpsc::Receiver<DispatchCommand>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor loop until shutdown or all handles drop
    pub async fn run(mut self) {
        while let Some(cmd) = self.mailbox.recv().await {
            if matches!(&cmd, DispatchCommand::Shutdown) {
                tracing::info!("dispatch actor shutting down");
                break;
            }
            self.handle_command(cmd);
        }
    }

    /// Handle a single command to completion
    fn handle_command(&mut self, cmd: DispatchCommand) {
        match cmd {
            DispatchCommand::Open { caller, response } => {
                let _ = response.send(self.ledger.open(&caller));
            }

            DispatchCommand::Close { caller, response } => {
                let _ = response.send(self.ledger.close(&caller));
            }

            DispatchCommand::ChangeLicensePlate {
                caller,
                plate,
                response,
            } => {
                let _ = response.send(self.ledger.change_license_plate(&caller, plate));
            }

            DispatchCommand::ChangeDownPaymentPercentage {
                caller,
                pct,
                response,
            } => {
                let _ = response.send(self.ledger.change_down_payment_percentage(&caller, pct));
            }

            DispatchCommand::SendRequest {
                caller,
                origin,
                destination,
                pickup_time,
                amount,
                attached,
                response,
            } => {
                let _ = response.send(self.ledger.send_request(
                    &caller,
                    origin,
                    destination,
                    pickup_time,
                    amount,
                    attached,
                ));
            }

            DispatchCommand::RetractRequest {
                caller,
                id,
                response,
            } => {
                let _ = response.send(self.ledger.retract_request(&caller, id));
            }

            DispatchCommand::AcceptRequest {
                caller,
                id,
                response,
            } => {
                let _ = response.send(self.ledger.accept_request(&caller, id));
            }

            DispatchCommand::CancelRequest {
                caller,
                id,
                response,
            } => {
                let _ = response.send(self.ledger.cancel_request(&caller, id));
            }

            DispatchCommand::FinishRequest {
                caller,
                id,
                attached,
                response,
            } => {
                let _ = response.send(self.ledger.finish_request(&caller, id, attached));
            }

            DispatchCommand::GetDriverStatus { response } => {
                let _ = response.send(self.ledger.driver_status());
            }

            DispatchCommand::GetLicensePlate { response } => {
                let _ = response.send(self.ledger.license_plate().to_string());
            }

            DispatchCommand::GetDownPaymentPercentage { response } => {
                let _ = response.send(self.ledger.down_payment_percentage());
            }

            DispatchCommand::GetNumRequests { response } => {
                let _ = response.send(self.ledger.num_requests());
            }

            DispatchCommand::GetRequestStatus { id, response } => {
                let _ = response.send(self.ledger.request_status(id));
            }

            DispatchCommand::GetRequest { id, response } => {
                let _ = response.send(self.ledger.request(id));
            }

            DispatchCommand::Shutdown => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending commands to the actor
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    sender: mpsc::Sender<DispatchCommand>,
}

impl DispatchHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<DispatchCommand>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> DispatchCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Open the driver for requests
    pub async fn open(&self, caller: AccountId) -> Result<()> {
        self.call(|response| DispatchCommand::Open { caller, response })
            .await?
    }

    /// Close the driver to requests
    pub async fn close(&self, caller: AccountId) -> Result<()> {
        self.call(|response| DispatchCommand::Close { caller, response })
            .await?
    }

    /// Replace the license plate
    pub async fn change_license_plate(&self, caller: AccountId, plate: String) -> Result<()> {
        self.call(|response| DispatchCommand::ChangeLicensePlate {
            caller,
            plate,
            response,
        })
        .await?
    }

    /// Change the down payment percentage
    pub async fn change_down_payment_percentage(&self, caller: AccountId, pct: u8) -> Result<()> {
        self.call(|response| DispatchCommand::ChangeDownPaymentPercentage {
            caller,
            pct,
            response,
        })
        .await?
    }

    /// Submit a trip request, returning its id
    pub async fn send_request(
        &self,
        caller: AccountId,
        origin: GeoPoint,
        destination: GeoPoint,
        pickup_time: DateTime<Utc>,
        amount: Decimal,
        attached: Decimal,
    ) -> Result<u64> {
        self.call(|response| DispatchCommand::SendRequest {
            caller,
            origin,
            destination,
            pickup_time,
            amount,
            attached,
            response,
        })
        .await?
    }

    /// Retract an open request
    pub async fn retract_request(&self, caller: AccountId, id: u64) -> Result<()> {
        self.call(|response| DispatchCommand::RetractRequest {
            caller,
            id,
            response,
        })
        .await?
    }

    /// Accept an open request
    pub async fn accept_request(&self, caller: AccountId, id: u64) -> Result<()> {
        self.call(|response| DispatchCommand::AcceptRequest {
            caller,
            id,
            response,
        })
        .await?
    }

    /// Cancel an accepted request
    pub async fn cancel_request(&self, caller: AccountId, id: u64) -> Result<()> {
        self.call(|response| DispatchCommand::CancelRequest {
            caller,
            id,
            response,
        })
        .await?
    }

    /// Advance the completion handshake
    pub async fn finish_request(
        &self,
        caller: AccountId,
        id: u64,
        attached: Decimal,
    ) -> Result<()> {
        self.call(|response| DispatchCommand::FinishRequest {
            caller,
            id,
            attached,
            response,
        })
        .await?
    }

    /// Read the driver status
    pub async fn driver_status(&self) -> Result<DriverStatus> {
        self.call(|response| DispatchCommand::GetDriverStatus { response })
            .await
    }

    /// Read the license plate
    pub async fn license_plate(&self) -> Result<String> {
        self.call(|response| DispatchCommand::GetLicensePlate { response })
            .await
    }

    /// Read the down payment percentage
    pub async fn down_payment_percentage(&self) -> Result<u8> {
        self.call(|response| DispatchCommand::GetDownPaymentPercentage { response })
            .await
    }

    /// Read the total request count
    pub async fn num_requests(&self) -> Result<u64> {
        self.call(|response| DispatchCommand::GetNumRequests { response })
            .await
    }

    /// Read the collapsed status of a request
    pub async fn request_status(&self, id: u64) -> Result<RequestStatus> {
        self.call(|response| DispatchCommand::GetRequestStatus { id, response })
            .await?
    }

    /// Read a full request snapshot
    pub async fn request(&self, id: u64) -> Result<Request> {
        self.call(|response| DispatchCommand::GetRequest { id, response })
            .await?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(DispatchCommand::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the dispatch actor for a configured ledger
pub fn spawn_dispatch_actor(config: Config) -> Result<DispatchHandle> {
    let capacity = config.mailbox_capacity;
    let ledger = DispatchLedger::new(config)?;
    let (tx, rx) = mpsc::channel(capacity);
    let actor = DispatchActor::new(ledger, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    Ok(DispatchHandle::new(tx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        Config {
            operator: "driver-1".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let handle = spawn_dispatch_actor(test_config()).unwrap();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_lifecycle_through_handle() {
        let handle = spawn_dispatch_actor(test_config()).unwrap();
        let operator = AccountId::new("driver-1");
        let rider = AccountId::new("rider-1");

        assert_eq!(handle.driver_status().await.unwrap(), DriverStatus::Closed);

        handle.open(operator.clone()).await.unwrap();
        let id = handle
            .send_request(
                rider.clone(),
                GeoPoint::new(321, 321),
                GeoPoint::new(123, 123),
                Utc::now(),
                Decimal::from(10_000),
                Decimal::from(1_000),
            )
            .await
            .unwrap();
        assert_eq!(id, 0);
        assert_eq!(handle.num_requests().await.unwrap(), 1);

        handle.accept_request(operator.clone(), id).await.unwrap();
        assert_eq!(handle.driver_status().await.unwrap(), DriverStatus::Busy);

        handle
            .finish_request(operator.clone(), id, Decimal::ZERO)
            .await
            .unwrap();
        handle
            .finish_request(rider, id, Decimal::from(9_000))
            .await
            .unwrap();

        assert_eq!(handle.driver_status().await.unwrap(), DriverStatus::Open);
        assert_eq!(
            handle.request_status(id).await.unwrap(),
            RequestStatus::Closed
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_propagates_ledger_errors() {
        let handle = spawn_dispatch_actor(test_config()).unwrap();

        let result = handle.open(AccountId::new("driver-2")).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        let result = handle.request_status(0).await;
        assert!(matches!(result, Err(Error::NotFound(0))));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_calls_after_shutdown_fail() {
        let handle = spawn_dispatch_actor(test_config()).unwrap();
        handle.shutdown().await.unwrap();

        // Give the actor a chance to drop the mailbox
        tokio::task::yield_now().await;

        let result = handle.num_requests().await;
        assert!(matches!(result, Err(Error::Concurrency(_))));
    }

    #[tokio::test]
    async fn test_handle_debug_output() {
        let handle = spawn_dispatch_actor(test_config()).unwrap();
        assert!(format!("{:?}", handle).contains("DispatchHandle"));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_clone_handles_share_state() {
        let handle = spawn_dispatch_actor(test_config()).unwrap();
        let other = handle.clone();
        let operator = AccountId::new("driver-1");

        handle.open(operator).await.unwrap();
        assert_eq!(other.driver_status().await.unwrap(), DriverStatus::Open);

        handle.shutdown().await.unwrap();
    }
}
