use doppel_core::{Amount, GameConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("doppel"),
            verbose: false,
        }
    }
}

impl CliConfig {
    pub fn new(data_dir: Option<PathBuf>, verbose: bool) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: data_dir.unwrap_or(defaults.data_dir),
            verbose,
        }
    }

    /// Game settings: `config.json` in the data directory, then the
    /// environment, then `entry_price` from the command line.
    pub fn game_config(&self, entry_price: Option<Amount>) -> doppel_core::Result<GameConfig> {
        let mut config = GameConfig::load(&self.config_path())?.apply_env()?;
        if let Some(entry_price) = entry_price {
            config.entry_price = entry_price;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_game_config_layers() {
        let dir = tempdir().unwrap();
        let cli = CliConfig::new(Some(dir.path().to_path_buf()), false);

        std::fs::write(cli.config_path(), r#"{ "entry_price": "2.00" }"#).unwrap();
        let config = cli.game_config(None).unwrap();
        assert_eq!(config.entry_price, Amount::from_units(2_000_000));

        let config = cli.game_config(Some(Amount::ZERO)).unwrap();
        assert!(config.is_promotional());
    }
}
