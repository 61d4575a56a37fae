// =============================================================================
// Shared types used across the EMA alignment scanner
// =============================================================================

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScannerError;

/// One day, used for lookback and cache windows.
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Which exchange universe an instrument list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Us,
    India,
}

impl Default for Market {
    fn default() -> Self {
        Self::Us
    }
}

impl Market {
    /// Exchange suffix the provider expects on this market's symbols, if any.
    pub fn symbol_suffix(self) -> Option<&'static str> {
        match self {
            Self::Us => None,
            Self::India => Some(".NS"),
        }
    }

    /// Short label used in logs, report headers and export file names.
    pub fn label(self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::India => "India",
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Market {
    type Err = ScannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "us" | "usa" => Ok(Self::Us),
            "india" | "in" | "nse" => Ok(Self::India),
            other => Err(ScannerError::UnknownMarket(other.to_string())),
        }
    }
}

/// Bar interval of the price series a scan runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Daily,
    Hourly,
    FifteenMinute,
    Weekly,
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::Daily
    }
}

impl Timeframe {
    /// Interval string understood by the market-data provider.
    pub fn interval(self) -> &'static str {
        match self {
            Self::Daily => "1d",
            Self::Hourly => "1h",
            Self::FifteenMinute => "15m",
            Self::Weekly => "1wk",
        }
    }

    /// How much history is requested so the 200-span EMA has settled.
    pub fn lookback(self) -> Duration {
        match self {
            Self::Daily => DAY * 500,
            Self::Hourly => DAY * 90,
            Self::FifteenMinute => DAY * 30,
            Self::Weekly => DAY * 365 * 7,
        }
    }

    /// Longest a fetched series may be reused before it counts as stale.
    pub fn cache_ttl(self) -> Duration {
        match self {
            Self::Hourly | Self::FifteenMinute => Duration::from_secs(60 * 60),
            Self::Daily | Self::Weekly => DAY,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Hourly => "Hourly",
            Self::FifteenMinute => "15 Minute",
            Self::Weekly => "Weekly",
        }
    }

    /// Label with whitespace removed, for file names.
    pub fn file_tag(self) -> String {
        self.label().replace(' ', "")
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Timeframe {
    type Err = ScannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "1d" | "d" => Ok(Self::Daily),
            "hourly" | "1h" | "60m" | "h" => Ok(Self::Hourly),
            "15m" | "15min" | "15 minute" | "fifteen_minute" => Ok(Self::FifteenMinute),
            "weekly" | "1wk" | "1w" | "w" => Ok(Self::Weekly),
            other => Err(ScannerError::UnknownTimeframe(other.to_string())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookback_windows_match_timeframe() {
        assert_eq!(Timeframe::Daily.lookback(), DAY * 500);
        assert_eq!(Timeframe::Hourly.lookback(), DAY * 90);
        assert_eq!(Timeframe::FifteenMinute.lookback(), DAY * 30);
        assert_eq!(Timeframe::Weekly.lookback(), DAY * 2555);
    }

    #[test]
    fn cache_ttl_bounded_per_timeframe() {
        let hour = Duration::from_secs(3600);
        assert!(Timeframe::Hourly.cache_ttl() <= hour);
        assert!(Timeframe::FifteenMinute.cache_ttl() <= hour);
        assert!(Timeframe::Daily.cache_ttl() <= DAY);
        assert!(Timeframe::Weekly.cache_ttl() <= DAY);
    }

    #[test]
    fn parse_timeframe_aliases() {
        assert_eq!("1d".parse::<Timeframe>().unwrap(), Timeframe::Daily);
        assert_eq!("Hourly".parse::<Timeframe>().unwrap(), Timeframe::Hourly);
        assert_eq!("15min".parse::<Timeframe>().unwrap(), Timeframe::FifteenMinute);
        assert_eq!("1wk".parse::<Timeframe>().unwrap(), Timeframe::Weekly);
        assert!("monthly".parse::<Timeframe>().is_err());
    }

    #[test]
    fn parse_market_and_suffix() {
        assert_eq!("US".parse::<Market>().unwrap(), Market::Us);
        assert_eq!("india".parse::<Market>().unwrap(), Market::India);
        assert!("mars".parse::<Market>().is_err());
        assert_eq!(Market::India.symbol_suffix(), Some(".NS"));
        assert_eq!(Market::Us.symbol_suffix(), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Timeframe::FifteenMinute).unwrap();
        assert_eq!(json, "\"fifteen_minute\"");
        let m: Market = serde_json::from_str("\"india\"").unwrap();
        assert_eq!(m, Market::India);
    }

    #[test]
    fn file_tag_has_no_spaces() {
        assert_eq!(Timeframe::FifteenMinute.file_tag(), "15Minute");
        assert_eq!(Timeframe::Daily.file_tag(), "Daily");
    }
}
