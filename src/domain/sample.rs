//! Sample entities
//!
//! A `PartialSample` is what the extractor reads off the statistics page.
//! A `Sample` is the same four indicators once they have been stamped with a
//! timestamp and the deployment's country and handed to the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The numeric indicators tracked on the statistics page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    /// Primary case count ("active" or "confirmed" depending on the page generation)
    PrimaryCount,
    Suspects,
    Recovered,
    Deaths,
}

impl StatField {
    pub const ALL: [Self; 4] = [Self::PrimaryCount, Self::Suspects, Self::Recovered, Self::Deaths];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryCount => "primary_count",
            Self::Suspects => "suspects",
            Self::Recovered => "recovered",
            Self::Deaths => "deaths",
        }
    }
}

impl fmt::Display for StatField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indicators extracted from one page load, before persistence.
///
/// `None` means the value could not be obtained; it is a normal,
/// comparable state and is distinct from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSample {
    pub primary_count: Option<i64>,
    pub suspects: Option<i64>,
    pub recovered: Option<i64>,
    pub deaths: Option<i64>,
}

impl PartialSample {
    pub fn get(&self, field: StatField) -> Option<i64> {
        match field {
            StatField::PrimaryCount => self.primary_count,
            StatField::Suspects => self.suspects,
            StatField::Recovered => self.recovered,
            StatField::Deaths => self.deaths,
        }
    }

    pub fn set(&mut self, field: StatField, value: Option<i64>) {
        match field {
            StatField::PrimaryCount => self.primary_count = value,
            StatField::Suspects => self.suspects = value,
            StatField::Recovered => self.recovered = value,
            StatField::Deaths => self.deaths = value,
        }
    }

    /// Number of fields that were successfully extracted
    pub fn present_count(&self) -> usize {
        StatField::ALL.iter().filter(|f| self.get(**f).is_some()).count()
    }
}

/// A persisted observation for one country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub primary_count: Option<i64>,
    pub suspects: Option<i64>,
    pub recovered: Option<i64>,
    pub deaths: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub country: String,
}

impl Sample {
    /// Merge extracted indicators with the persistence-time metadata.
    ///
    /// The timestamp is truncated to microseconds, the precision the store keeps.
    pub fn stamp(partial: PartialSample, country: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            primary_count: partial.primary_count,
            suspects: partial.suspects,
            recovered: partial.recovered,
            deaths: partial.deaths,
            timestamp: truncate_to_micros(at),
            country: country.into(),
        }
    }

    /// The numeric part of the sample, as compared by the change detector
    pub fn counts(&self) -> PartialSample {
        PartialSample {
            primary_count: self.primary_count,
            suspects: self.suspects,
            recovered: self.recovered,
            deaths: self.deaths,
        }
    }
}

/// Drop sub-microsecond precision from an instant
pub fn truncate_to_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_micros(at.timestamp_micros()).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stamp_copies_counts_and_metadata() {
        let partial = PartialSample {
            primary_count: Some(120),
            suspects: Some(5),
            recovered: None,
            deaths: Some(3),
        };
        let at = Utc.with_ymd_and_hms(2020, 4, 2, 12, 0, 0).unwrap();

        let sample = Sample::stamp(partial, "angola", at);

        assert_eq!(sample.counts(), partial);
        assert_eq!(sample.country, "angola");
        assert_eq!(sample.timestamp, at);
    }

    #[test]
    fn test_stamp_truncates_nanoseconds() {
        let at = Utc.timestamp_opt(1_585_828_800, 123_456_789).unwrap();
        let sample = Sample::stamp(PartialSample::default(), "angola", at);
        assert_eq!(sample.timestamp.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_get_and_set_by_field() {
        let mut partial = PartialSample::default();
        for (value, field) in StatField::ALL.into_iter().enumerate() {
            partial.set(field, Some(value as i64));
        }
        assert_eq!(partial.get(StatField::PrimaryCount), Some(0));
        assert_eq!(partial.get(StatField::Deaths), Some(3));
        assert_eq!(partial.present_count(), 4);
    }
}
