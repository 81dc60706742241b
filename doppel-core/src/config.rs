use crate::error::{DoppelError, Result};
use crate::types::Amount;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Stake each player pays. Zero runs the game in promotional mode.
    pub entry_price: Amount,
    /// Bearer secret guarding the resolve sweep. No secret, no sweep over HTTP.
    pub resolver_secret: Option<String>,
    pub sweep_interval: Duration,
    pub webhook_url: Option<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            entry_price: Amount::from_units(500_000), // 0.5 USDC
            resolver_secret: None,
            sweep_interval: Duration::from_secs(60),
            webhook_url: None,
        }
    }
}

impl GameConfig {
    pub fn promotional() -> Self {
        Self {
            entry_price: Amount::ZERO,
            ..Self::default()
        }
    }

    pub fn is_promotional(&self) -> bool {
        self.entry_price.is_zero()
    }

    /// Loads a JSON config file, falling back to defaults when it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: GameConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `DOPPEL_ENTRY_PRICE`, `DOPPEL_RESOLVER_SECRET` and
    /// `DOPPEL_WEBHOOK_URL` on top of the current values.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(price) = std::env::var("DOPPEL_ENTRY_PRICE") {
            self.entry_price = price
                .parse()
                .map_err(|e| DoppelError::config(format!("DOPPEL_ENTRY_PRICE: {}", e)))?;
        }
        if let Ok(secret) = std::env::var("DOPPEL_RESOLVER_SECRET") {
            self.resolver_secret = Some(secret);
        }
        if let Ok(url) = std::env::var("DOPPEL_WEBHOOK_URL") {
            self.webhook_url = Some(url);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(DoppelError::config("Sweep interval must be greater than 0"));
        }

        if matches!(&self.resolver_secret, Some(secret) if secret.is_empty()) {
            return Err(DoppelError::config("Resolver secret cannot be empty"));
        }

        if let Some(url) = &self.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(DoppelError::config(format!(
                    "Webhook URL must be http(s): {}",
                    url
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_promotional());
        assert!(GameConfig::promotional().is_promotional());
    }

    #[test]
    fn test_rejects_empty_secret_and_bad_url() {
        let mut config = GameConfig::default();
        config.resolver_secret = Some(String::new());
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.webhook_url = Some("ftp://example.com".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"entry_price": "0", "resolver_secret": "s3cret"}"#).unwrap();

        let config = GameConfig::load(&path).unwrap();
        assert!(config.is_promotional());
        assert_eq!(config.resolver_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));

        let missing = GameConfig::load(&dir.path().join("missing.json")).unwrap();
        assert_eq!(missing.entry_price, GameConfig::default().entry_price);
    }
}
