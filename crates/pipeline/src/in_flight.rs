//! Per-address single-flight registry.
//!
//! Every build re-reads the UTXO set, so two concurrent builds from one
//! address can select the same input and collide at submission. An address
//! is reserved when a transaction is built for it and released when that
//! transaction is submitted or rejected, when the client reports a proof for
//! the note or abandons the build, or once the reservation outlives the
//! timeout (the signer walked away).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use quicknotes_core::types::DbId;
use tokio::sync::Mutex;

use crate::error::PipelineError;

/// Default lifetime of an unsubmitted reservation: two TTL horizons.
pub const DEFAULT_IN_FLIGHT_TIMEOUT: Duration = Duration::from_secs(2400);

/// An address held by a built, not yet submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub address: String,
    pub note_id: DbId,
    pub tx_id: Option<String>,
    reserved_at: Instant,
}

pub struct InFlightRegistry {
    timeout: Duration,
    entries: Mutex<HashMap<String, Reservation>>,
}

impl Default for InFlightRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_IN_FLIGHT_TIMEOUT)
    }
}

impl InFlightRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve `address` for a transaction on `note_id`.
    ///
    /// A rebuild for the same note replaces its own reservation; the earlier
    /// unsigned transaction is abandoned. A different note is refused while
    /// the reservation is live.
    pub async fn reserve(&self, address: &str, note_id: DbId) -> Result<(), PipelineError> {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);

        if let Some(existing) = entries.get(address) {
            if existing.note_id != note_id {
                return Err(PipelineError::AddressBusy {
                    address: address.to_string(),
                    note_id: existing.note_id,
                });
            }
        }

        entries.insert(
            address.to_string(),
            Reservation {
                address: address.to_string(),
                note_id,
                tx_id: None,
                reserved_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Record the id of the transaction built under a reservation.
    pub async fn bind(&self, address: &str, tx_id: &str) {
        if let Some(entry) = self.entries.lock().await.get_mut(address) {
            entry.tx_id = Some(tx_id.to_string());
        }
    }

    /// Drop the reservation holding `tx_id`, returning it.
    pub async fn release_tx(&self, tx_id: &str) -> Option<Reservation> {
        let mut entries = self.entries.lock().await;
        let address = entries
            .values()
            .find(|r| r.tx_id.as_deref() == Some(tx_id))
            .map(|r| r.address.clone())?;
        entries.remove(&address)
    }

    /// Drop the reservation held for `note_id`, whichever address it is on.
    pub async fn release_note(&self, note_id: DbId) -> Option<Reservation> {
        let mut entries = self.entries.lock().await;
        let address = entries
            .values()
            .find(|r| r.note_id == note_id)
            .map(|r| r.address.clone())?;
        entries.remove(&address)
    }

    /// Drop whatever reservation `address` holds.
    pub async fn release(&self, address: &str) -> Option<Reservation> {
        self.entries.lock().await.remove(address)
    }

    /// Live reservation for `address`, if any.
    pub async fn get(&self, address: &str) -> Option<Reservation> {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);
        entries.get(address).cloned()
    }

    fn purge_expired(&self, entries: &mut HashMap<String, Reservation>) {
        let before = entries.len();
        entries.retain(|_, r| r.reserved_at.elapsed() < self.timeout);
        let expired = before - entries.len();
        if expired > 0 {
            tracing::debug!(expired, "Dropped expired in-flight reservations");
        }
    }
}
