//! Wallet trait and confirmation handles.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use intentroute_common::{Address, NetworkId, Result, TxDescriptor, TxHash};
use serde::{Deserialize, Serialize};

/// Confirmation of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash (or signature).
    pub hash: TxHash,
    /// Network the transaction was mined on.
    pub network: NetworkId,
    /// Block (or slot) that included it.
    pub block_number: u64,
    /// Gas consumed, where the network meters gas.
    pub gas_used: Option<u64>,
}

/// A submitted transaction awaiting confirmation.
///
/// The hash is known at submission; [`PendingTransaction::wait`] resolves
/// once the transaction is confirmed, or fails if it is dropped or reverts.
pub struct PendingTransaction {
    hash: TxHash,
    confirmation: BoxFuture<'static, Result<Receipt>>,
}

impl PendingTransaction {
    /// Create a handle from a hash and the future that confirms it.
    pub fn new<F>(hash: TxHash, confirmation: F) -> Self
    where
        F: Future<Output = Result<Receipt>> + Send + 'static,
    {
        Self {
            hash,
            confirmation: confirmation.boxed(),
        }
    }

    /// A handle that is already confirmed.
    pub fn confirmed(receipt: Receipt) -> Self {
        let hash = receipt.hash.clone();
        Self::new(hash, futures::future::ready(Ok(receipt)))
    }

    /// Hash of the submitted transaction.
    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    /// Wait for confirmation.
    pub async fn wait(self) -> Result<Receipt> {
        self.confirmation.await
    }
}

impl fmt::Debug for PendingTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTransaction")
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

/// Signs and submits transactions for one identity.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Address of this wallet on `network`.
    async fn get_address(&self, network: &NetworkId) -> Result<Address>;

    /// Sign and submit a transaction.
    ///
    /// Returns as soon as the transaction is accepted for broadcast. No
    /// timeout applies to the returned handle at this layer.
    async fn sign_and_send_transaction(
        &self,
        network: &NetworkId,
        tx: &TxDescriptor,
    ) -> Result<PendingTransaction>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use intentroute_common::IntentError;

    fn receipt() -> Receipt {
        Receipt {
            hash: TxHash::new("0xabc"),
            network: NetworkId::bnb(),
            block_number: 1,
            gas_used: Some(21_000),
        }
    }

    #[tokio::test]
    async fn test_confirmed_handle() {
        let pending = PendingTransaction::confirmed(receipt());

        assert_eq!(pending.hash().as_str(), "0xabc");
        assert_eq!(pending.wait().await.unwrap().block_number, 1);
    }

    #[tokio::test]
    async fn test_failing_handle() {
        let pending = PendingTransaction::new(TxHash::new("0xdead"), async {
            Err(IntentError::transaction_failed("confirm", "reverted"))
        });

        let result = pending.wait().await;
        assert!(matches!(result, Err(IntentError::TransactionFailed { .. })));
    }
}
