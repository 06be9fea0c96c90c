//! In-memory wallet configuration.

use std::time::Duration;

/// Configuration for [`crate::InMemoryWallet`].
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Delay between submission and confirmation.
    pub confirmation_delay: Duration,
    /// Reject every submission (signing failure).
    pub reject_all: bool,
    /// First block number handed out.
    pub starting_block: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            confirmation_delay: Duration::from_millis(0),
            reject_all: false,
            starting_block: 1,
        }
    }
}

impl WalletConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ms) = std::env::var("INTENTROUTE_WALLET_CONFIRMATION_MS") {
            if let Ok(ms) = ms.parse() {
                config.confirmation_delay = Duration::from_millis(ms);
            }
        }

        if let Ok(reject) = std::env::var("INTENTROUTE_WALLET_REJECT_ALL") {
            config.reject_all = reject.eq_ignore_ascii_case("true") || reject == "1";
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.confirmation_delay > Duration::from_secs(600) {
            return Err("Confirmation delay cannot exceed 10 minutes".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(WalletConfig::default().validate().is_ok());
    }

    #[test]
    fn test_excessive_delay_rejected() {
        let config = WalletConfig {
            confirmation_delay: Duration::from_secs(3600),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
