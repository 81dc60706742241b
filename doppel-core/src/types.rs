use crate::error::DoppelError;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Players per game. 23 people give a ~50% chance of a shared birthday.
pub const COHORT_SIZE: usize = 23;

/// External (Farcaster) identity of a player.
pub type Fid = u64;

/// USDC amount in base units (6 decimals). Serialized as a decimal USDC
/// string such as `"0.50"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const UNITS_PER_USDC: u64 = 1_000_000;

    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    pub const fn units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_mul(self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(factor).map(Amount)
    }

    /// Splits the amount into `parts` equal shares, returning the share and the
    /// undistributed remainder.
    pub fn split(self, parts: u64) -> Option<(Amount, Amount)> {
        if parts == 0 {
            return None;
        }
        Some((Amount(self.0 / parts), Amount(self.0 % parts)))
    }

    /// Rounds half up to whole cents: `1.642857` becomes `"1.64"`.
    pub fn to_cents_string(&self) -> String {
        let cents = self.0.saturating_add(5_000) / 10_000;
        format!("{}.{:02}", cents / 100, cents % 100)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::UNITS_PER_USDC;
        let frac = format!("{:06}", self.0 % Self::UNITS_PER_USDC);
        let mut frac = frac.trim_end_matches('0').to_string();
        while frac.len() < 2 {
            frac.push('0');
        }
        write!(f, "{}.{}", whole, frac)
    }
}

impl FromStr for Amount {
    type Err = DoppelError;

    /// Parses a decimal USDC value such as `0.5` or `11.50`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DoppelError::invalid_value(format!("invalid USDC amount: '{}'", s));
        let (whole, frac) = match s.trim().split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s.trim(), ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > 6 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac_units: u64 = if frac.is_empty() {
            0
        } else {
            format!("{:0<6}", frac).parse().map_err(|_| invalid())?
        };
        whole
            .checked_mul(Self::UNITS_PER_USDC)
            .and_then(|units| units.checked_add(frac_units))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

/// Calendar day without a year, written `MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Birthday {
    month: u8,
    day: u8,
}

const DAYS_IN_MONTH: [u8; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

impl Birthday {
    pub fn new(month: u8, day: u8) -> crate::Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(DoppelError::invalid_value(format!("invalid month {}", month)));
        }
        if day == 0 || day > DAYS_IN_MONTH[month as usize - 1] {
            return Err(DoppelError::invalid_value(format!(
                "invalid day {} for month {}",
                day, month
            )));
        }
        Ok(Self { month, day })
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }
}

impl fmt::Display for Birthday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

impl FromStr for Birthday {
    type Err = DoppelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DoppelError::invalid_value(format!("birthday must be MM-DD, got '{}'", s));
        let (month, day) = s.split_once('-').ok_or_else(invalid)?;
        if month.len() != 2 || day.len() != 2 {
            return Err(invalid());
        }
        let month: u8 = month.parse().map_err(|_| invalid())?;
        let day: u8 = day.parse().map_err(|_| invalid())?;
        Birthday::new(month, day)
    }
}

impl TryFrom<String> for Amount {
    type Error = DoppelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl TryFrom<String> for Birthday {
    type Error = DoppelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Birthday> for String {
    fn from(birthday: Birthday) -> Self {
        birthday.to_string()
    }
}

/// Side a player takes: `Yes` bets that two members share a birthday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Yes,
    No,
}

impl BetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Yes => "yes",
            BetType::No => "no",
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetType {
    type Err = DoppelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(BetType::Yes),
            "no" => Ok(BetType::No),
            _ => Err(DoppelError::invalid_value(format!(
                "bet must be 'yes' or 'no', got '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Open,
    Full,
    Resolved,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Open => "open",
            GameStatus::Full => "full",
            GameStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = DoppelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(GameStatus::Open),
            "full" => Ok(GameStatus::Full),
            "resolved" => Ok(GameStatus::Resolved),
            other => Err(DoppelError::invalid_value(format!(
                "unknown game status '{}'",
                other
            ))),
        }
    }
}

/// Result fields written once, together, when a game is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOutcome {
    pub resolved_at: DateTime<Utc>,
    pub winning_bet: BetType,
    pub has_birthday_match: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: Uuid,
    pub status: GameStatus,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: Option<GameOutcome>,
}

impl Game {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: GameStatus::Open,
            created_at: Utc::now().trunc_subsecs(3),
            outcome: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == GameStatus::Resolved
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: Uuid,
    pub fid: Fid,
    pub wallet: String,
    pub birthday: Birthday,
    pub bet: Option<BetType>,
    pub paid: bool,
    #[serde(skip)]
    pub payment_proof: Option<String>,
    pub payout: Option<Amount>,
    pub game_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Player {
    pub fn new(game_id: Uuid, fid: Fid, wallet: impl Into<String>, birthday: Birthday) -> Self {
        Self {
            id: Uuid::new_v4(),
            fid,
            wallet: wallet.into(),
            birthday,
            bet: None,
            paid: false,
            payment_proof: None,
            payout: None,
            game_id,
            created_at: Utc::now().trunc_subsecs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_birthday_parsing() {
        let birthday: Birthday = "03-14".parse().unwrap();
        assert_eq!(birthday.month(), 3);
        assert_eq!(birthday.day(), 14);
        assert_eq!(birthday.to_string(), "03-14");

        assert!("02-29".parse::<Birthday>().is_ok());
        assert!("02-30".parse::<Birthday>().is_err());
        assert!("13-01".parse::<Birthday>().is_err());
        assert!("3-14".parse::<Birthday>().is_err());
        assert!("03/14".parse::<Birthday>().is_err());
        assert!("".parse::<Birthday>().is_err());
    }

    #[test]
    fn test_birthday_serde_as_string() {
        let birthday = Birthday::new(12, 1).unwrap();
        assert_eq!(serde_json::to_string(&birthday).unwrap(), "\"12-01\"");
        assert!(serde_json::from_str::<Birthday>("\"04-31\"").is_err());
    }

    #[test]
    fn test_bet_type_parsing() {
        assert_eq!("yes".parse::<BetType>().unwrap(), BetType::Yes);
        assert_eq!("NO".parse::<BetType>().unwrap(), BetType::No);
        assert!("maybe".parse::<BetType>().is_err());
        assert_eq!(serde_json::to_string(&BetType::Yes).unwrap(), "\"yes\"");
    }

    #[test]
    fn test_amount_display_and_parse() {
        assert_eq!(Amount::from_units(500_000).to_string(), "0.50");
        assert_eq!(Amount::from_units(11_500_000).to_string(), "11.50");
        assert_eq!(Amount::from_units(1_642_857).to_string(), "1.642857");

        assert_eq!("0.5".parse::<Amount>().unwrap(), Amount::from_units(500_000));
        assert_eq!("11".parse::<Amount>().unwrap(), Amount::from_units(11_000_000));
        assert!("0.0000001".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn test_amount_serde_as_usdc_string() {
        let payout = Amount::from_units(500_000);
        assert_eq!(serde_json::to_string(&payout).unwrap(), "\"0.50\"");
        assert_eq!(serde_json::from_str::<Amount>("\"0.50\"").unwrap(), payout);
        assert_eq!(
            serde_json::from_str::<Amount>("\"1.642857\"").unwrap(),
            Amount::from_units(1_642_857)
        );
        // base units are never accepted on the wire
        assert!(serde_json::from_str::<Amount>("500000").is_err());
        assert!(serde_json::from_str::<Amount>("\"-1\"").is_err());
    }

    #[test]
    fn test_amount_cents_rounding() {
        assert_eq!(Amount::from_units(1_642_857).to_cents_string(), "1.64");
        assert_eq!(Amount::from_units(1_150_000).to_cents_string(), "1.15");
        assert_eq!(Amount::from_units(500_000).to_cents_string(), "0.50");
        assert_eq!(Amount::from_units(1_995_000).to_cents_string(), "2.00");
        assert_eq!(Amount::ZERO.to_cents_string(), "0.00");
    }

    #[test]
    fn test_amount_split() {
        let pot = Amount::from_units(11_500_000);
        let (share, dust) = pot.split(7).unwrap();
        assert_eq!(share.units() * 7 + dust.units(), pot.units());
        assert!(pot.split(0).is_none());
    }

    #[test]
    fn test_game_outcome_flattened() {
        let game = Game::new();
        let json = serde_json::to_value(&game).unwrap();
        assert_eq!(json["status"], "open");
        assert!(json.get("winningBet").is_none());
    }
}
