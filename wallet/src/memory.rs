//! A wallet that signs nothing and confirms everything locally.
//!
//! Used by the simulator and by tests. Every submission is recorded, and
//! the event log shows the exact interleaving of sends and confirmations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use intentroute_common::{Address, IntentError, NetworkId, Result, TxDescriptor, TxHash};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::WalletConfig;
use crate::wallet::{PendingTransaction, Receipt, Wallet};

/// A transaction accepted by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub network: NetworkId,
    pub tx: TxDescriptor,
    pub hash: TxHash,
}

/// Submission and confirmation events, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    Sent(TxHash),
    Confirmed(TxHash),
    Reverted(TxHash),
}

#[derive(Debug)]
struct Ledger {
    nonce: u64,
    block: u64,
    sent: Vec<SentTransaction>,
    events: Vec<WalletEvent>,
}

/// In-memory [`Wallet`].
pub struct InMemoryWallet {
    default_address: Address,
    addresses: HashMap<NetworkId, Address>,
    config: WalletConfig,
    rejected_targets: Mutex<HashSet<Address>>,
    reverted_targets: Mutex<HashSet<Address>>,
    ledger: Arc<Mutex<Ledger>>,
}

impl InMemoryWallet {
    /// Create a wallet using `address` on every network.
    pub fn new(address: Address) -> Self {
        Self::with_config(address, WalletConfig::default())
    }

    /// Create a wallet with custom configuration.
    pub fn with_config(address: Address, config: WalletConfig) -> Self {
        let block = config.starting_block;
        Self {
            default_address: address,
            addresses: HashMap::new(),
            config,
            rejected_targets: Mutex::new(HashSet::new()),
            reverted_targets: Mutex::new(HashSet::new()),
            ledger: Arc::new(Mutex::new(Ledger {
                nonce: 0,
                block,
                sent: Vec::new(),
                events: Vec::new(),
            })),
        }
    }

    /// Use a different address on one network.
    pub fn with_address(mut self, network: NetworkId, address: Address) -> Self {
        self.addresses.insert(network, address);
        self
    }

    /// Refuse to sign transactions sent to `target`.
    pub fn reject_sends_to(&self, target: Address) {
        self.rejected_targets.lock().insert(target);
    }

    /// Accept transactions sent to `target` but revert them on confirmation.
    pub fn revert_sends_to(&self, target: Address) {
        self.reverted_targets.lock().insert(target);
    }

    /// Transactions accepted so far.
    pub fn sent(&self) -> Vec<SentTransaction> {
        self.ledger.lock().sent.clone()
    }

    /// Event log.
    pub fn events(&self) -> Vec<WalletEvent> {
        self.ledger.lock().events.clone()
    }

    fn address_for(&self, network: &NetworkId) -> Address {
        self.addresses
            .get(network)
            .cloned()
            .unwrap_or_else(|| self.default_address.clone())
    }
}

/// Deterministic pseudo hash of a submission.
fn transaction_hash(network: &NetworkId, nonce: u64, tx: &TxDescriptor) -> TxHash {
    let mut hasher = Sha256::new();
    hasher.update(network.as_str().as_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.update(tx.to.as_str().as_bytes());
    hasher.update(tx.data.as_bytes());
    hasher.update(tx.value.to_be_bytes());
    let digest = hasher.finalize();

    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    TxHash::new(format!("0x{}", hex))
}

#[async_trait]
impl Wallet for InMemoryWallet {
    async fn get_address(&self, network: &NetworkId) -> Result<Address> {
        Ok(self.address_for(network))
    }

    async fn sign_and_send_transaction(
        &self,
        network: &NetworkId,
        tx: &TxDescriptor,
    ) -> Result<PendingTransaction> {
        if self.config.reject_all || self.rejected_targets.lock().contains(&tx.to) {
            return Err(IntentError::transaction_failed(
                "sign",
                format!("wallet refused to sign transaction to {}", tx.to),
            ));
        }

        let hash = {
            let mut ledger = self.ledger.lock();
            ledger.nonce += 1;
            let hash = transaction_hash(network, ledger.nonce, tx);
            ledger.sent.push(SentTransaction {
                network: network.clone(),
                tx: tx.clone(),
                hash: hash.clone(),
            });
            ledger.events.push(WalletEvent::Sent(hash.clone()));
            hash
        };
        debug!(network = %network, to = %tx.to, hash = %hash, "Transaction submitted");

        let reverts = self.reverted_targets.lock().contains(&tx.to);
        let delay = self.config.confirmation_delay;
        let ledger = self.ledger.clone();
        let network = network.clone();
        let confirm_hash = hash.clone();

        Ok(PendingTransaction::new(hash, async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut ledger = ledger.lock();
            if reverts {
                ledger.events.push(WalletEvent::Reverted(confirm_hash.clone()));
                return Err(IntentError::transaction_failed(
                    "confirm",
                    format!("transaction {} reverted", confirm_hash),
                ));
            }

            ledger.block += 1;
            ledger.events.push(WalletEvent::Confirmed(confirm_hash.clone()));
            Ok(Receipt {
                hash: confirm_hash,
                network,
                block_number: ledger.block,
                gas_used: Some(21_000),
            })
        }))
    }
}
