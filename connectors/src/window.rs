use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tether::{Error, Result};

/// Time range sent as `start` / `end` query parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// The `days` days leading up to `now`.
    ///
    /// Fails with [`Error::Configuration`] when the start would fall outside
    /// the representable date range.
    pub fn last_days(days: u32, now: DateTime<Utc>) -> Result<Self> {
        let start = Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                Error::Configuration(format!("fetch window of {days} days is out of range"))
            })?;
        Ok(Self { start, end: now })
    }

    /// Query parameters for this window.
    pub fn params(&self) -> Vec<(String, String)> {
        vec![
            ("start".to_string(), iso8601(self.start)),
            ("end".to_string(), iso8601(self.end)),
        ]
    }
}

fn iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_days() {
        let now = DateTime::parse_from_rfc3339("2024-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let window = FetchWindow::last_days(7, now).unwrap();

        assert_eq!(
            window.params(),
            vec![
                ("start".to_string(), "2024-03-03T12:00:00.000Z".to_string()),
                ("end".to_string(), "2024-03-10T12:00:00.000Z".to_string()),
            ]
        );
    }

    #[test]
    fn test_last_days_out_of_range() {
        let now = DateTime::parse_from_rfc3339("2024-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(matches!(
            FetchWindow::last_days(u32::MAX, now),
            Err(Error::Configuration(_))
        ));
        assert_eq!(FetchWindow::last_days(0, now).unwrap().start, now);
    }
}
