//! In-process chain indexer and wallet for tests.
//!
//! These stand in for Blockfrost and a browser wallet. They are test doubles
//! only; production code never branches on a "simulation" mode.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_cbor::Value;

use crate::address::Address;
use crate::assembler::split_transaction;
use crate::cbor;
use crate::indexer::{ChainIndexer, ChainTip, IndexerError, ProtocolParameters, TxLookup, Utxo};
use crate::wallet::{WalletBridge, WalletError, WalletSession};

/// Enterprise address on a test network, deterministic.
pub fn test_address() -> Address {
    test_address_for(0x11)
}

/// Enterprise test-network address whose key hash is `tag` repeated.
pub fn test_address_for(tag: u8) -> Address {
    let mut bytes = vec![0x60];
    bytes.extend_from_slice(&[tag; 28]);
    // 29 bytes with a Shelley header always parse.
    Address::from_bytes(bytes).unwrap_or_else(|e| panic!("test address: {e}"))
}

/// 32-byte transaction hash made of `tag`, hex.
pub fn test_tx_hash(tag: u8) -> String {
    hex::encode([tag; 32])
}

/// Witness set `{0: [[vkey, signature]]}` with bytes derived from `tag`.
pub fn fake_witness_set(tag: u8) -> Vec<u8> {
    let witness = Value::Array(vec![Value::Bytes(vec![tag; 32]), Value::Bytes(vec![tag; 64])]);
    let mut set = BTreeMap::new();
    set.insert(Value::Integer(0), Value::Array(vec![witness]));
    cbor::encode(&Value::Map(set)).unwrap_or_default()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Indexer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChainState {
    utxos: HashMap<Vec<u8>, Vec<Utxo>>,
    spent: HashSet<(String, u32)>,
    confirmed: HashMap<String, u64>,
    submitted: Vec<String>,
    rejection: Option<String>,
}

/// A chain indexer backed by in-memory state.
///
/// Submissions are checked for a vkey witness, an unexpired TTL and unspent
/// inputs, mirroring the ledger rules a real node would report.
pub struct SimulatedIndexer {
    params: ProtocolParameters,
    tip_slot: Mutex<u64>,
    state: Mutex<ChainState>,
    fail_parameters: AtomicBool,
    fail_lookups: AtomicBool,
    lookups: AtomicUsize,
}

impl Default for SimulatedIndexer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedIndexer {
    pub const DEFAULT_TIP_SLOT: u64 = 50_000_000;

    /// Preview-network parameters.
    pub fn default_parameters() -> ProtocolParameters {
        ProtocolParameters {
            min_fee_a: 44,
            min_fee_b: 155_381,
            max_tx_size: 16_384,
            max_val_size: 5_000,
            coins_per_utxo_byte: 4_310,
        }
    }

    pub fn new() -> Self {
        Self {
            params: Self::default_parameters(),
            tip_slot: Mutex::new(Self::DEFAULT_TIP_SLOT),
            state: Mutex::default(),
            fail_parameters: AtomicBool::new(false),
            fail_lookups: AtomicBool::new(false),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_utxos(self, address: &Address, utxos: Vec<Utxo>) -> Self {
        self.set_utxos(address, utxos);
        self
    }

    pub fn set_utxos(&self, address: &Address, utxos: Vec<Utxo>) {
        lock(&self.state).utxos.insert(address.as_bytes().to_vec(), utxos);
    }

    pub fn set_tip_slot(&self, slot: u64) {
        *lock(&self.tip_slot) = slot;
    }

    /// Include a transaction in a block.
    pub fn confirm(&self, tx_hash: &str) {
        let mut state = lock(&self.state);
        let height = state.confirmed.len() as u64 + 1;
        state.confirmed.insert(tx_hash.to_string(), height);
    }

    /// Make parameter and tip fetches fail as if the indexer were down.
    pub fn set_fail_parameters(&self, fail: bool) {
        self.fail_parameters.store(fail, Ordering::SeqCst);
    }

    /// Make transaction lookups fail as if the indexer were down.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Reject every submission with `message` until cleared.
    pub fn reject_submissions(&self, message: Option<&str>) {
        lock(&self.state).rejection = message.map(str::to_string);
    }

    /// Ids of accepted submissions, in order.
    pub fn submitted(&self) -> Vec<String> {
        lock(&self.state).submitted.clone()
    }

    /// Number of transaction lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn unavailable() -> IndexerError {
        IndexerError::Unavailable("simulated outage".to_string())
    }

    fn rejected(message: impl Into<String>) -> IndexerError {
        IndexerError::Api {
            status: 400,
            body: message.into(),
        }
    }
}

#[async_trait]
impl ChainIndexer for SimulatedIndexer {
    async fn latest_epoch_parameters(&self) -> Result<ProtocolParameters, IndexerError> {
        if self.fail_parameters.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.params.clone())
    }

    async fn address_utxos(&self, address: &Address) -> Result<Vec<Utxo>, IndexerError> {
        let state = lock(&self.state);
        let utxos = state
            .utxos
            .get(address.as_bytes())
            .map(|utxos| {
                utxos
                    .iter()
                    .filter(|u| !state.spent.contains(&(u.tx_hash.clone(), u.output_index)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(utxos)
    }

    async fn latest_block(&self) -> Result<ChainTip, IndexerError> {
        if self.fail_parameters.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(ChainTip {
            slot: *lock(&self.tip_slot),
            height: None,
            hash: None,
        })
    }

    async fn transaction(&self, tx_hash: &str) -> Result<TxLookup, IndexerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(match lock(&self.state).confirmed.get(tx_hash) {
            Some(height) => TxLookup::Found {
                block_height: Some(*height),
            },
            None => TxLookup::NotFound,
        })
    }

    async fn submit_transaction(&self, signed: &[u8]) -> Result<String, IndexerError> {
        let parts = split_transaction(signed)
            .map_err(|e| Self::rejected(format!("DeserialiseFailure: {e}")))?;
        let body = cbor::decode(parts.body)
            .map_err(|e| Self::rejected(format!("DeserialiseFailure: {e}")))?;
        let witnesses = cbor::decode(parts.witness_set)
            .map_err(|e| Self::rejected(format!("DeserialiseFailure: {e}")))?;

        let mut state = lock(&self.state);
        if let Some(message) = &state.rejection {
            return Err(Self::rejected(message.clone()));
        }
        if !matches!(cbor::map_get(&witnesses, 0), Some(Value::Array(w)) if !w.is_empty()) {
            return Err(Self::rejected("MissingVKeyWitnessesUTXOW"));
        }
        let ttl = cbor::map_get(&body, 3).and_then(cbor::as_u64);
        if ttl.is_some_and(|ttl| ttl < *lock(&self.tip_slot)) {
            return Err(Self::rejected("ExpiredUTxO"));
        }

        let mut inputs = Vec::new();
        if let Some(Value::Array(items)) = cbor::map_get(&body, 0) {
            for item in items {
                if let Value::Array(pair) = item {
                    if let [Value::Bytes(hash), index] = pair.as_slice() {
                        let index = cbor::as_u64(index).unwrap_or_default() as u32;
                        inputs.push((hex::encode(hash), index));
                    }
                }
            }
        }
        if inputs.iter().any(|input| state.spent.contains(input)) {
            return Err(Self::rejected("BadInputsUTxO"));
        }

        let tx_id = cbor::tx_id(parts.body);
        state.spent.extend(inputs);
        state.submitted.push(tx_id.clone());
        Ok(tx_id)
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

struct WalletState {
    address: Address,
    utxos: Vec<Utxo>,
    rejecting: AtomicBool,
    unavailable: AtomicBool,
    sign_requests: AtomicUsize,
    disconnects: AtomicUsize,
    indexer: Option<Arc<SimulatedIndexer>>,
}

/// A wallet that signs with a deterministic fake witness.
///
/// Cheap to clone; clones share state, so a test can keep a handle while a
/// session is in use.
#[derive(Clone)]
pub struct SimulatedWallet {
    inner: Arc<WalletState>,
}

impl SimulatedWallet {
    pub fn new(address: Address, utxos: Vec<Utxo>) -> Self {
        Self::build(address, utxos, None)
    }

    /// Route `submit_tx` through `indexer`.
    pub fn with_indexer(address: Address, utxos: Vec<Utxo>, indexer: Arc<SimulatedIndexer>) -> Self {
        Self::build(address, utxos, Some(indexer))
    }

    fn build(address: Address, utxos: Vec<Utxo>, indexer: Option<Arc<SimulatedIndexer>>) -> Self {
        Self {
            inner: Arc::new(WalletState {
                address,
                utxos,
                rejecting: AtomicBool::new(false),
                unavailable: AtomicBool::new(false),
                sign_requests: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                indexer,
            }),
        }
    }

    /// Make the user decline every signing request.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.inner.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Make `enable` fail as if no wallet were installed.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn sign_requests(&self) -> usize {
        self.inner.sign_requests.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }

    fn utxo_cbor(&self, utxo: &Utxo) -> Result<String, WalletError> {
        let hash = hex::decode(&utxo.tx_hash)
            .map_err(|e| WalletError::Internal(format!("bad utxo hash: {e}")))?;
        let input = Value::Array(vec![
            Value::Bytes(hash),
            Value::Integer(i128::from(utxo.output_index)),
        ]);
        let output = Value::Array(vec![
            Value::Bytes(self.inner.address.as_bytes().to_vec()),
            Value::Integer(i128::from(utxo.lovelace)),
        ]);
        cbor::encode(&Value::Array(vec![input, output]))
            .map(hex::encode)
            .map_err(|e| WalletError::Internal(e.to_string()))
    }
}

#[async_trait]
impl WalletBridge for SimulatedWallet {
    async fn enable(&self) -> Result<Box<dyn WalletSession>, WalletError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(WalletError::Unavailable("no wallet installed".to_string()));
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl WalletSession for SimulatedWallet {
    async fn change_address(&self) -> Result<String, WalletError> {
        Ok(self.inner.address.to_hex())
    }

    async fn used_addresses(&self) -> Result<Vec<String>, WalletError> {
        Ok(vec![self.inner.address.to_hex()])
    }

    async fn unused_addresses(&self) -> Result<Vec<String>, WalletError> {
        Ok(Vec::new())
    }

    async fn utxos(&self) -> Result<Vec<String>, WalletError> {
        self.inner.utxos.iter().map(|u| self.utxo_cbor(u)).collect()
    }

    async fn balance(&self) -> Result<String, WalletError> {
        let total: u64 = self.inner.utxos.iter().map(|u| u.lovelace).sum();
        cbor::encode(&Value::Integer(i128::from(total)))
            .map(hex::encode)
            .map_err(|e| WalletError::Internal(e.to_string()))
    }

    async fn sign_tx(&self, unsigned_hex: &str, _partial: bool) -> Result<String, WalletError> {
        self.inner.sign_requests.fetch_add(1, Ordering::SeqCst);
        if self.inner.rejecting.load(Ordering::SeqCst) {
            return Err(WalletError::Rejected("user declined to sign".to_string()));
        }
        let bytes = hex::decode(unsigned_hex)
            .map_err(|e| WalletError::InvalidResponse(format!("unsigned tx is not hex: {e}")))?;
        split_transaction(&bytes).map_err(|e| WalletError::Internal(e.to_string()))?;
        Ok(hex::encode(fake_witness_set(0x5a)))
    }

    async fn submit_tx(&self, signed_hex: &str) -> Result<String, WalletError> {
        let bytes = hex::decode(signed_hex)
            .map_err(|e| WalletError::Internal(format!("signed tx is not hex: {e}")))?;
        match &self.inner.indexer {
            Some(indexer) => indexer
                .submit_transaction(&bytes)
                .await
                .map_err(|e| WalletError::Internal(e.to_string())),
            None => split_transaction(&bytes)
                .map(|parts| cbor::tx_id(parts.body))
                .map_err(|e| WalletError::Internal(e.to_string())),
        }
    }

    async fn disconnect(&self) {
        self.inner.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}
