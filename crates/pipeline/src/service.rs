//! Note-mutation pipeline: fetch parameters -> fetch UTXOs -> build ->
//! sign (external) -> assemble -> submit -> record proof.
//!
//! Nothing is written to a note before the indexer accepts the signed
//! transaction, and a freshly submitted proof is always `pending`; only the
//! confirmation poller moves it to `confirmed`.

use std::sync::Arc;
use std::time::Duration;

use quicknotes_cardano::assembler::{self, split_transaction};
use quicknotes_cardano::builder::DEFAULT_TTL_SLOTS;
use quicknotes_cardano::{
    cbor, Address, ChainIndexer, IndexerError, SignedTransaction, TransactionBuilder, TxError,
    UnsignedTransaction, Utxo, WalletBridge, WalletSession,
};
use quicknotes_core::hashing::note_fingerprint;
use quicknotes_core::note::{validate_tx_hash, validate_wallet_address};
use quicknotes_core::payload::{NoteAction, NotePayload};
use quicknotes_core::types::DbId;
use quicknotes_db::models::note::Note;
use quicknotes_db::NoteStore;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::in_flight::{InFlightRegistry, Reservation};

/// Inputs to an unsigned build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub note_id: DbId,
    /// Sender address, bech32 or hex.
    pub wallet_address: String,
    pub action: NoteAction,
    /// Hash to anchor. Defaults to the note's content fingerprint.
    pub hash: Option<String>,
    /// UTXOs reported by the wallet. Read from the indexer when absent.
    pub utxos: Option<Vec<Utxo>>,
}

/// Result of an accepted submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub tx_hash: String,
    /// The note the proof was attached to, if one was named.
    pub note: Option<Note>,
}

pub struct NoteChainService {
    store: Arc<dyn NoteStore>,
    indexer: Arc<dyn ChainIndexer>,
    in_flight: InFlightRegistry,
    ttl_slots: u64,
}

impl NoteChainService {
    pub fn new(store: Arc<dyn NoteStore>, indexer: Arc<dyn ChainIndexer>) -> Self {
        Self {
            store,
            indexer,
            in_flight: InFlightRegistry::default(),
            ttl_slots: DEFAULT_TTL_SLOTS,
        }
    }

    pub fn with_ttl_slots(mut self, ttl_slots: u64) -> Self {
        self.ttl_slots = ttl_slots;
        self
    }

    pub fn with_in_flight_timeout(mut self, timeout: Duration) -> Self {
        self.in_flight = InFlightRegistry::new(timeout);
        self
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    async fn load_note(&self, id: DbId) -> Result<Note, PipelineError> {
        self.store
            .get(id)
            .await?
            .ok_or(PipelineError::NoteNotFound(id))
    }

    /// Build an unsigned transaction anchoring `request.note_id`.
    ///
    /// Reserves the sender address until the transaction is submitted or the
    /// reservation times out. A failed build releases it again.
    pub async fn build_unsigned(
        &self,
        request: &BuildRequest,
    ) -> Result<UnsignedTransaction, PipelineError> {
        validate_wallet_address(&request.wallet_address)
            .map_err(|e| PipelineError::Validation(e.to_string()))?;
        let sender = Address::parse(&request.wallet_address)?;

        let note = self.load_note(request.note_id).await?;
        if note.is_confirmed() {
            return Err(PipelineError::Conflict(format!(
                "Note {} already has a confirmed proof",
                note.id
            )));
        }

        let hash = match &request.hash {
            Some(hash) => hash.clone(),
            None => note_fingerprint(&note.title, &note.content),
        };
        let payload = NotePayload::new(
            request.action,
            note.id,
            &note.title,
            Some(&note.content),
            Some(&hash),
            chrono::Utc::now(),
        )
        .to_json();

        let key = sender.to_string();
        self.in_flight.reserve(&key, note.id).await?;

        let builder = TransactionBuilder::new(self.indexer.as_ref()).with_ttl_slots(self.ttl_slots);
        let built = match &request.utxos {
            Some(utxos) => builder.build(&sender, utxos, &payload).await,
            None => builder.build_from_chain(&sender, &payload).await,
        };
        let unsigned = match built {
            Ok(unsigned) => unsigned,
            Err(e) => {
                self.in_flight.release(&key).await;
                return Err(e.into());
            }
        };
        self.in_flight.bind(&key, &unsigned.tx_id).await;

        tracing::info!(
            note_id = note.id,
            address = %key,
            tx_id = %unsigned.tx_id,
            action = %request.action,
            fee = unsigned.fee,
            "Built unsigned note transaction"
        );

        Ok(unsigned)
    }

    /// Splice a wallet witness set into an unsigned transaction.
    pub fn assemble(
        &self,
        unsigned_hex: &str,
        witness_set_hex: &str,
    ) -> Result<SignedTransaction, PipelineError> {
        Ok(assembler::assemble(unsigned_hex, witness_set_hex)?)
    }

    /// Submit a signed transaction and, if `note_id` is given, attach the
    /// resulting hash to that note as a `pending` proof.
    pub async fn submit(
        &self,
        signed_hex: &str,
        note_id: Option<DbId>,
    ) -> Result<SubmitOutcome, PipelineError> {
        let bytes = cbor::decode_hex("signedTxHex", signed_hex)?;
        let tx_id = cbor::tx_id(split_transaction(&bytes)?.body);

        if let Some(id) = note_id {
            let note = self.load_note(id).await?;
            if note.is_confirmed() && note.tx_hash.as_deref() != Some(tx_id.as_str()) {
                return Err(PipelineError::Conflict(format!(
                    "Note {id} already has a confirmed proof"
                )));
            }
        }

        let tx_hash = match self.indexer.submit_transaction(&bytes).await {
            Ok(hash) => hash.to_ascii_lowercase(),
            Err(e) => {
                // The body's inputs or TTL are stale now; the client rebuilds.
                if let Some(released) = self.in_flight.release_tx(&tx_id).await {
                    tracing::debug!(
                        address = %released.address,
                        note_id = released.note_id,
                        "Released address after rejected submission"
                    );
                }
                return Err(submission_error(e).into());
            }
        };
        let reservation = self.in_flight.release_tx(&tx_id).await;

        tracing::info!(tx_hash = %tx_hash, note_id = ?note_id, "Transaction submitted");

        let note = match note_id {
            Some(id) => {
                let address = reservation.as_ref().map(|r| r.address.as_str());
                let attached = self
                    .store
                    .attach_proof(id, &tx_hash, address)
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            note_id = id,
                            tx_hash = %tx_hash,
                            error = %e,
                            "Submitted transaction could not be recorded on the note"
                        );
                        e
                    })?;
                Some(attached.ok_or(PipelineError::NoteNotFound(id))?)
            }
            None => None,
        };

        Ok(SubmitOutcome { tx_hash, note })
    }

    /// Assemble, then submit.
    pub async fn assemble_and_submit(
        &self,
        unsigned_hex: &str,
        witness_set_hex: &str,
        note_id: Option<DbId>,
    ) -> Result<SubmitOutcome, PipelineError> {
        let signed = self.assemble(unsigned_hex, witness_set_hex)?;
        self.submit(&signed.cbor_hex, note_id).await
    }

    /// Run the whole pipeline for a note with an enabled wallet session.
    ///
    /// Signing waits on a human; cancelling `cancel` while it is pending
    /// aborts the pipeline. Any failure after the build frees the address and
    /// leaves the note untouched.
    pub async fn run_with_session(
        &self,
        session: &dyn WalletSession,
        note_id: DbId,
        action: NoteAction,
        cancel: &CancellationToken,
    ) -> Result<SubmitOutcome, PipelineError> {
        let address = session.address().await?;
        if session.lovelace_balance().await? == 0 {
            return Err(TxError::NoSpendableInput.into());
        }
        let utxos = session.spendable_utxos().await?;
        let request = BuildRequest {
            note_id,
            wallet_address: address.to_string(),
            action,
            hash: None,
            utxos: Some(utxos),
        };
        let unsigned = self.build_unsigned(&request).await?;

        let result = self.sign_and_submit(session, &unsigned, note_id, cancel).await;
        if let Err(e) = &result {
            self.in_flight.release(&request.wallet_address).await;
            tracing::info!(note_id, tx_id = %unsigned.tx_id, error = %e, "Note transaction aborted");
        }
        result
    }

    /// Enable a wallet, run the pipeline with its session, then disconnect
    /// whatever the outcome.
    pub async fn run_with_wallet(
        &self,
        wallet: &dyn WalletBridge,
        note_id: DbId,
        action: NoteAction,
        cancel: &CancellationToken,
    ) -> Result<SubmitOutcome, PipelineError> {
        let session = wallet.enable().await?;
        let result = self
            .run_with_session(session.as_ref(), note_id, action, cancel)
            .await;
        session.disconnect().await;
        result
    }

    async fn sign_and_submit(
        &self,
        session: &dyn WalletSession,
        unsigned: &UnsignedTransaction,
        note_id: DbId,
        cancel: &CancellationToken,
    ) -> Result<SubmitOutcome, PipelineError> {
        let witness_set = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(TxError::SigningRejected("signing was cancelled".to_string()).into());
            }
            signed = session.sign_tx(&unsigned.cbor_hex, false) => signed?,
        };
        self.assemble_and_submit(&unsigned.cbor_hex, &witness_set, Some(note_id))
            .await
    }

    /// Record a transaction hash the client submitted on its own.
    pub async fn attach_proof(&self, note_id: DbId, tx_hash: &str) -> Result<Note, PipelineError> {
        validate_tx_hash(tx_hash).map_err(|e| PipelineError::Validation(e.to_string()))?;
        let tx_hash = tx_hash.to_ascii_lowercase();

        let note = self
            .store
            .attach_proof(note_id, &tx_hash, None)
            .await?
            .ok_or(PipelineError::NoteNotFound(note_id))?;

        // The client's wallet submitted on its own; the build is settled.
        self.in_flight.release_note(note_id).await;

        tracing::info!(note_id, tx_hash = %tx_hash, "Attached on-chain proof");

        Ok(note)
    }

    /// Drop the reservation an unsubmitted build holds on `wallet_address`,
    /// e.g. after the user declined to sign in the browser.
    pub async fn abandon(&self, wallet_address: &str) -> Result<Option<Reservation>, PipelineError> {
        validate_wallet_address(wallet_address)
            .map_err(|e| PipelineError::Validation(e.to_string()))?;
        let key = Address::parse(wallet_address)?.to_string();
        let released = self.in_flight.release(&key).await;
        if let Some(reservation) = &released {
            tracing::info!(
                address = %key,
                note_id = reservation.note_id,
                "Abandoned unsubmitted note transaction"
            );
        }
        Ok(released)
    }
}

/// The indexer's rejection, verbatim.
fn submission_error(err: IndexerError) -> TxError {
    match err {
        IndexerError::Api { body, .. } => TxError::Submission(body),
        other => TxError::Submission(other.to_string()),
    }
}
