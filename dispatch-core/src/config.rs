//! Configuration for the dispatch ledger

use serde::{Deserialize, Serialize};

/// Ledger configuration
///
/// One configuration instantiates one ledger: a single operator account
/// with its initial profile values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Sole account authorized for operator-only actions
    pub operator: String,

    /// Initial license plate
    pub license_plate: String,

    /// Initial down payment percentage (0-100)
    pub down_payment_percentage: u8,

    /// Actor mailbox capacity (bounded channel for backpressure)
    pub mailbox_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "dispatch-core".to_string(),
            operator: "operator".to_string(),
            license_plate: String::new(),
            down_payment_percentage: 10,
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(operator) = std::env::var("DISPATCH_OPERATOR") {
            config.operator = operator;
        }

        if let Ok(plate) = std::env::var("DISPATCH_LICENSE_PLATE") {
            config.license_plate = plate;
        }

        if let Ok(pct) = std::env::var("DISPATCH_DOWN_PAYMENT_PCT") {
            config.down_payment_percentage = pct.parse().map_err(|_| {
                crate::Error::Config(format!("Invalid DISPATCH_DOWN_PAYMENT_PCT: {}", pct))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration bounds
    pub fn validate(&self) -> crate::Result<()> {
        if self.down_payment_percentage > 100 {
            return Err(crate::Error::Config(format!(
                "down_payment_percentage must be within 0-100, got {}",
                self.down_payment_percentage
            )));
        }

        if self.operator.is_empty() {
            return Err(crate::Error::Config(
                "operator account must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
