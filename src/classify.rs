//! Ordinal bands for upstream health metrics.
//!
//! | metric            | low    | medium     | high   |
//! |-------------------|--------|------------|--------|
//! | recovery (0-100)  | < 34   | 34 to < 67 | >= 67  |
//! | strain (>= 0)     | < 10   | 10 to < 14 | >= 14  |
//! | hrv (ms)          | < 40   | 40 to < 80 | >= 80  |
//!
//! Recovery follows WHOOP's red/yellow/green bands.

use serde::{Deserialize, Serialize};
use std::fmt;

const RECOVERY_MEDIUM: f64 = 34.0;
const RECOVERY_HIGH: f64 = 67.0;
const STRAIN_MEDIUM: f64 = 10.0;
const STRAIN_HIGH: f64 = 14.0;
const HRV_MEDIUM_MS: f64 = 40.0;
const HRV_HIGH_MS: f64 = 80.0;

/// Three-tier level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn band(value: f64, medium: f64, high: f64) -> Level {
    if value < medium {
        Level::Low
    } else if value < high {
        Level::Medium
    } else {
        Level::High
    }
}

/// Recovery score (0-100).
pub fn recovery_level(score: f64) -> Level {
    band(score, RECOVERY_MEDIUM, RECOVERY_HIGH)
}

/// Day strain (unbounded, typically 0-21).
pub fn strain_level(strain: f64) -> Level {
    band(strain, STRAIN_MEDIUM, STRAIN_HIGH)
}

/// Heart-rate variability (RMSSD, milliseconds).
pub fn hrv_level(hrv_ms: f64) -> Level {
    band(hrv_ms, HRV_MEDIUM_MS, HRV_HIGH_MS)
}
