//! IntentRoute Wallet Interface
//!
//! The signing side of an operation. Key management and transaction
//! submission live behind the [`Wallet`] trait; the router only needs an
//! address per network and a handle it can wait on for confirmation.

pub mod config;
pub mod memory;
pub mod wallet;

pub use config::WalletConfig;
pub use memory::{InMemoryWallet, SentTransaction, WalletEvent};
pub use wallet::{PendingTransaction, Receipt, Wallet};
