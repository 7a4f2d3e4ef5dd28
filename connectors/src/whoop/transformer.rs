use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tether::classify::{hrv_level, recovery_level, strain_level, Level};
use tether::{Error, Result};

use super::api::{CycleRecord, RecoveryRecord, SleepRecord, StageSummary, WhoopDataType};

/// Normalized WHOOP measurement.
///
/// Only the fields the source record carries are set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WhoopMetric {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hrv_ms: Option<i64>,
    /// 0 to 21
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strain: Option<f64>,
    /// 0 to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_stage: Option<SleepStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_level: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strain_level: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hrv_level: Option<Level>,
}

impl WhoopMetric {
    fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            hrv_ms: None,
            strain: None,
            recovery: None,
            sleep_stage: None,
            recovery_level: None,
            strain_level: None,
            hrv_level: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepStage {
    Awake,
    Light,
    Deep,
    Rem,
    Unknown,
}

/// Dominant stage of a sleep; ties go to the deeper stage.
pub fn dominant_stage(summary: &StageSummary) -> SleepStage {
    let stages = [
        (SleepStage::Deep, summary.total_slow_wave_sleep_time_milli),
        (SleepStage::Rem, summary.total_rem_sleep_time_milli),
        (SleepStage::Light, summary.total_light_sleep_time_milli),
        (SleepStage::Awake, summary.total_awake_time_milli),
    ];

    stages
        .iter()
        .filter(|(_, millis)| *millis > 0)
        .fold(None, |best: Option<(SleepStage, u64)>, &(stage, millis)| match best {
            Some((_, top)) if top >= millis => best,
            _ => Some((stage, millis)),
        })
        .map(|(stage, _)| stage)
        .unwrap_or(SleepStage::Unknown)
}

fn parse<T: DeserializeOwned>(data_type: WhoopDataType, record: Value) -> Result<T> {
    serde_json::from_value(record)
        .map_err(|e| Error::MalformedResponse(format!("WHOOP {data_type} record: {e}")))
}

/// Maps one raw record of `data_type` into a metric.
pub fn record_to_metric(data_type: WhoopDataType, record: Value) -> Result<WhoopMetric> {
    match data_type {
        WhoopDataType::Recovery => {
            let record: RecoveryRecord = parse(data_type, record)?;
            let mut metric = WhoopMetric::at(record.created_at);
            if let Some(score) = record.score {
                metric.recovery = score.recovery_score.map(|s| s.round() as i64);
                metric.recovery_level = score.recovery_score.map(recovery_level);
                metric.hrv_ms = score.hrv_rmssd_milli.map(|h| h.round() as i64);
                metric.hrv_level = score.hrv_rmssd_milli.map(hrv_level);
            }
            Ok(metric)
        }
        WhoopDataType::Hrv => {
            let record: RecoveryRecord = parse(data_type, record)?;
            let mut metric = WhoopMetric::at(record.created_at);
            if let Some(hrv) = record.score.and_then(|s| s.hrv_rmssd_milli) {
                metric.hrv_ms = Some(hrv.round() as i64);
                metric.hrv_level = Some(hrv_level(hrv));
            }
            Ok(metric)
        }
        WhoopDataType::Strain => {
            let record: CycleRecord = parse(data_type, record)?;
            let mut metric = WhoopMetric::at(record.start);
            if let Some(strain) = record.score.and_then(|s| s.strain) {
                metric.strain = Some(strain);
                metric.strain_level = Some(strain_level(strain));
            }
            Ok(metric)
        }
        WhoopDataType::Sleep => {
            let record: SleepRecord = parse(data_type, record)?;
            let mut metric = WhoopMetric::at(record.start);
            let stage = record
                .score
                .and_then(|s| s.stage_summary)
                .map(|summary| dominant_stage(&summary))
                .unwrap_or(SleepStage::Unknown);
            metric.sleep_stage = Some(stage);
            Ok(metric)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recovery_record() {
        let record = json!({
            "cycle_id": 93845,
            "sleep_id": 10235,
            "created_at": "2024-03-10T11:25:44.774Z",
            "score_state": "SCORED",
            "score": {
                "recovery_score": 44.0,
                "resting_heart_rate": 64.0,
                "hrv_rmssd_milli": 31.813562
            }
        });

        let metric = record_to_metric(WhoopDataType::Recovery, record).unwrap();
        assert_eq!(metric.recovery, Some(44));
        assert_eq!(metric.recovery_level, Some(Level::Medium));
        assert_eq!(metric.hrv_ms, Some(32));
        assert_eq!(metric.hrv_level, Some(Level::Low));
        assert!(metric.strain.is_none());
    }

    #[test]
    fn test_unscored_recovery_has_no_values() {
        let record = json!({"created_at": "2024-03-10T11:25:44Z", "score_state": "PENDING_SCORE"});
        let metric = record_to_metric(WhoopDataType::Recovery, record).unwrap();
        assert!(metric.recovery.is_none());
        assert!(metric.hrv_ms.is_none());
    }

    #[test]
    fn test_hrv_record_only_sets_hrv() {
        let record = json!({
            "created_at": "2024-03-10T11:25:44Z",
            "score": {"recovery_score": 90.0, "hrv_rmssd_milli": 85.2}
        });
        let metric = record_to_metric(WhoopDataType::Hrv, record).unwrap();
        assert_eq!(metric.hrv_ms, Some(85));
        assert_eq!(metric.hrv_level, Some(Level::High));
        assert!(metric.recovery.is_none());
    }

    #[test]
    fn test_cycle_record() {
        let record = json!({
            "id": 93845,
            "start": "2024-03-09T05:00:00Z",
            "score": {"strain": 12.6, "average_heart_rate": 68.0}
        });
        let metric = record_to_metric(WhoopDataType::Strain, record).unwrap();
        assert_eq!(metric.strain, Some(12.6));
        assert_eq!(metric.strain_level, Some(Level::Medium));
    }

    #[test]
    fn test_sleep_record_dominant_stage() {
        let record = json!({
            "id": 1,
            "start": "2024-03-09T23:10:00Z",
            "score": {
                "stage_summary": {
                    "total_awake_time_milli": 1_800_000,
                    "total_light_sleep_time_milli": 12_000_000,
                    "total_slow_wave_sleep_time_milli": 6_000_000,
                    "total_rem_sleep_time_milli": 5_400_000
                }
            }
        });
        let metric = record_to_metric(WhoopDataType::Sleep, record).unwrap();
        assert_eq!(metric.sleep_stage, Some(SleepStage::Light));
    }

    #[test]
    fn test_dominant_stage_ties_and_empty() {
        let tie = StageSummary {
            total_light_sleep_time_milli: 100,
            total_slow_wave_sleep_time_milli: 100,
            ..StageSummary::default()
        };
        assert_eq!(dominant_stage(&tie), SleepStage::Deep);
        assert_eq!(dominant_stage(&StageSummary::default()), SleepStage::Unknown);
    }

    #[test]
    fn test_missing_timestamp_is_malformed() {
        let record = json!({"score": {"strain": 3.0}});
        assert!(matches!(
            record_to_metric(WhoopDataType::Strain, record),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_metric_serialization_skips_absent_fields() {
        let record = json!({"start": "2024-03-09T05:00:00Z", "score": {"strain": 15.0}});
        let metric = record_to_metric(WhoopDataType::Strain, record).unwrap();
        let value = serde_json::to_value(&metric).unwrap();

        assert_eq!(value["strain"], 15.0);
        assert_eq!(value["strain_level"], "high");
        assert!(value.get("recovery").is_none());
    }
}
