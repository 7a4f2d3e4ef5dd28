use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tether::Error;

/// Collections the WHOOP connector can query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WhoopDataType {
    /// Daily recovery score with HRV and resting heart rate
    Recovery,
    Sleep,
    /// Physiological cycle strain
    Strain,
    /// HRV only, taken from recovery records
    Hrv,
}

impl WhoopDataType {
    pub fn endpoint(&self) -> &'static str {
        match self {
            WhoopDataType::Recovery | WhoopDataType::Hrv => "/v1/recovery",
            WhoopDataType::Sleep => "/v1/activity/sleep",
            WhoopDataType::Strain => "/v1/cycle",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WhoopDataType::Recovery => "recovery",
            WhoopDataType::Sleep => "sleep",
            WhoopDataType::Strain => "strain",
            WhoopDataType::Hrv => "hrv",
        }
    }
}

impl fmt::Display for WhoopDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WhoopDataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "recovery" => Ok(WhoopDataType::Recovery),
            "sleep" => Ok(WhoopDataType::Sleep),
            "strain" | "cycle" | "cycles" => Ok(WhoopDataType::Strain),
            "hrv" => Ok(WhoopDataType::Hrv),
            other => Err(Error::Configuration(format!(
                "unknown WHOOP data type '{other}' (expected recovery, sleep, strain or hrv)"
            ))),
        }
    }
}

/// WHOOP recovery record.
#[derive(Debug, Deserialize)]
pub struct RecoveryRecord {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub score: Option<RecoveryScore>,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryScore {
    pub recovery_score: Option<f64>,
    pub hrv_rmssd_milli: Option<f64>,
}

/// WHOOP sleep record.
#[derive(Debug, Deserialize)]
pub struct SleepRecord {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub score: Option<SleepScore>,
}

#[derive(Debug, Deserialize)]
pub struct SleepScore {
    pub stage_summary: Option<StageSummary>,
}

/// Milliseconds spent in each stage.
#[derive(Debug, Default, Deserialize)]
pub struct StageSummary {
    #[serde(default)]
    pub total_awake_time_milli: u64,
    #[serde(default)]
    pub total_light_sleep_time_milli: u64,
    #[serde(default)]
    pub total_slow_wave_sleep_time_milli: u64,
    #[serde(default)]
    pub total_rem_sleep_time_milli: u64,
}

/// WHOOP physiological cycle.
#[derive(Debug, Deserialize)]
pub struct CycleRecord {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub score: Option<CycleScore>,
}

#[derive(Debug, Deserialize)]
pub struct CycleScore {
    pub strain: Option<f64>,
}
