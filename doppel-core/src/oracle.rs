use crate::error::{DoppelError, Result};
use crate::types::{Birthday, Fid};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashMap;

/// Source of a player's birthday. Asked once, when the player joins.
#[async_trait]
pub trait BirthdayOracle: Send + Sync {
    async fn birthday(&self, fid: Fid) -> Result<Birthday>;
}

/// 2021-01-01T00:00:00Z
pub const FARCASTER_EPOCH: i64 = 1_609_459_200;

/// Derives a stable pseudo-birthday from the fid's offset to the Farcaster
/// epoch.
#[derive(Debug, Default, Clone)]
pub struct EpochBirthdayOracle;

impl EpochBirthdayOracle {
    pub fn new() -> Self {
        Self
    }

    pub fn birthday_for(fid: Fid) -> Result<Birthday> {
        if fid == 0 {
            return Err(DoppelError::oracle("fid must be non-zero"));
        }
        let offset = (fid % 7_890_000) * 13 % 7_890_000;
        let ts = FARCASTER_EPOCH + offset as i64;
        let date: DateTime<Utc> = DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| DoppelError::oracle(format!("timestamp out of range for fid {}", fid)))?;
        Birthday::new(date.month() as u8, date.day() as u8)
    }
}

#[async_trait]
impl BirthdayOracle for EpochBirthdayOracle {
    async fn birthday(&self, fid: Fid) -> Result<Birthday> {
        Self::birthday_for(fid)
    }
}

/// Returns preset birthdays; unknown fids are an error.
#[derive(Debug, Default, Clone)]
pub struct FixedBirthdayOracle {
    birthdays: HashMap<Fid, Birthday>,
}

impl FixedBirthdayOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, fid: Fid, birthday: Birthday) -> Self {
        self.birthdays.insert(fid, birthday);
        self
    }
}

#[async_trait]
impl BirthdayOracle for FixedBirthdayOracle {
    async fn birthday(&self, fid: Fid) -> Result<Birthday> {
        self.birthdays
            .get(&fid)
            .copied()
            .ok_or_else(|| DoppelError::oracle(format!("no birthday known for fid {}", fid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_epoch_oracle_is_deterministic() {
        let oracle = EpochBirthdayOracle::new();
        let first = oracle.birthday(1234).await.unwrap();
        let second = oracle.birthday(1234).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_epoch_oracle_known_values() {
        // fid 1 -> 13s after the epoch
        assert_eq!(EpochBirthdayOracle::birthday_for(1).unwrap().to_string(), "01-01");
        // fid 6646 -> 86 398s, still Jan 1st; 6647 -> 86 411s, Jan 2nd
        assert_eq!(EpochBirthdayOracle::birthday_for(6646).unwrap().to_string(), "01-01");
        assert_eq!(EpochBirthdayOracle::birthday_for(6647).unwrap().to_string(), "01-02");
        assert!(EpochBirthdayOracle::birthday_for(0).is_err());
    }

    #[tokio::test]
    async fn test_fixed_oracle() {
        let oracle = FixedBirthdayOracle::new().with(5, "03-14".parse().unwrap());
        assert_eq!(oracle.birthday(5).await.unwrap().to_string(), "03-14");
        assert!(oracle.birthday(6).await.is_err());
    }
}
