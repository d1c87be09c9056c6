//! Rate Limit Profiles
//!
//! Named, fully specified rate limit configurations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::RateLimitConfig;
use crate::error::GovernorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitProfile {
    /// 2 calls/s, burst 5
    Conservative,
    /// 10 calls/s, burst 20
    Balanced,
    /// 50 calls/s, burst 100
    Aggressive,
    /// Limiting switched off
    Development,
}

impl RateLimitProfile {
    pub fn all() -> [RateLimitProfile; 4] {
        [
            RateLimitProfile::Conservative,
            RateLimitProfile::Balanced,
            RateLimitProfile::Aggressive,
            RateLimitProfile::Development,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            RateLimitProfile::Conservative => "conservative",
            RateLimitProfile::Balanced => "balanced",
            RateLimitProfile::Aggressive => "aggressive",
            RateLimitProfile::Development => "development",
        }
    }

    /// The profile's settings. Fields not listed keep their defaults.
    pub fn config(&self) -> RateLimitConfig {
        let (enabled, calls_per_second, burst) = match self {
            RateLimitProfile::Conservative => (true, 2.0, 5.0),
            RateLimitProfile::Balanced => (true, 10.0, 20.0),
            RateLimitProfile::Aggressive => (true, 50.0, 100.0),
            RateLimitProfile::Development => (false, 1000.0, 2000.0),
        };
        RateLimitConfig {
            enabled,
            global_calls_per_second: calls_per_second,
            global_burst: burst,
            ..RateLimitConfig::default()
        }
    }
}

impl fmt::Display for RateLimitProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RateLimitProfile {
    type Err = GovernorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        RateLimitProfile::all()
            .into_iter()
            .find(|profile| profile.name() == wanted)
            .ok_or_else(|| {
                GovernorError::InvalidConfiguration(format!("unknown rate limit profile '{s}'"))
            })
    }
}
