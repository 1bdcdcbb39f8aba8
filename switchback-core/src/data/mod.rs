//! Market data access — providers, caching, resampling, and the process-wide
//! risk-free series.
//!
//! The [`Manager`] is the single entry point: it routes symbols to providers
//! by prefix (`$RATE.` series go to FRED, everything else to Tiingo),
//! memoizes fetched frames per `(provider, symbol, frequency)`, and answers
//! risk-free-rate lookups from a once-loaded daily T-Bill snapshot.

use std::fmt;
use std::str::FromStr;

pub mod fred;
pub mod manager;
pub mod provider;
pub mod riskfree;
pub mod tiingo;

pub use fred::FredProvider;
pub use manager::Manager;
pub use provider::{Provider, ProviderError};
pub use riskfree::RiskFreeSeries;
pub use tiingo::TiingoProvider;

/// Sampling frequency for provider queries.
///
/// The manager never resamples client-side; the frequency is forwarded to
/// the provider's `resampleFreq` parameter and the response is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Annually,
}

impl Frequency {
    /// Value of the Tiingo `resampleFreq` query parameter.
    pub fn resample_param(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Annually => "annually",
        }
    }

    /// Value of the FRED `fq` query parameter.
    pub fn fred_param(self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Annually => "Annual",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resample_param())
    }
}

impl FromStr for Frequency {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "annually" => Ok(Frequency::Annually),
            _ => Err(ProviderError::InvalidFrequency(s.to_string())),
        }
    }
}

/// The closed set of price metrics a frame's value column can hold.
///
/// Adjusted values are the canonical input for all return math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Open,
    High,
    Low,
    Close,
    Volume,
    AdjustedOpen,
    AdjustedHigh,
    AdjustedLow,
    AdjustedClose,
}

impl Metric {
    /// Column header carrying this metric in a Tiingo EOD CSV response.
    pub fn csv_column(self) -> &'static str {
        match self {
            Metric::Open => "open",
            Metric::High => "high",
            Metric::Low => "low",
            Metric::Close => "close",
            Metric::Volume => "volume",
            Metric::AdjustedOpen => "adjOpen",
            Metric::AdjustedHigh => "adjHigh",
            Metric::AdjustedLow => "adjLow",
            Metric::AdjustedClose => "adjClose",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.csv_column())
    }
}

impl FromStr for Metric {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Metric::Open),
            "high" => Ok(Metric::High),
            "low" => Ok(Metric::Low),
            "close" => Ok(Metric::Close),
            "volume" => Ok(Metric::Volume),
            "adjOpen" => Ok(Metric::AdjustedOpen),
            "adjHigh" => Ok(Metric::AdjustedHigh),
            "adjLow" => Ok(Metric::AdjustedLow),
            "adjClose" => Ok(Metric::AdjustedClose),
            _ => Err(ProviderError::InvalidMetric(s.to_string())),
        }
    }
}
