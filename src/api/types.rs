//! Response bodies

use chrono::SecondsFormat;
use serde::Serialize;

use crate::domain::sample::Sample;

/// A stored sample as served by the read endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleView {
    pub primary_count: Option<i64>,
    pub suspects: Option<i64>,
    pub recovered: Option<i64>,
    pub deaths: Option<i64>,
    /// RFC 3339 in UTC with a `Z` suffix
    pub timestamp: String,
    pub country: String,
}

impl From<&Sample> for SampleView {
    fn from(sample: &Sample) -> Self {
        Self {
            primary_count: sample.primary_count,
            suspects: sample.suspects,
            recovered: sample.recovered,
            deaths: sample.deaths,
            timestamp: sample.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            country: sample.country.clone(),
        }
    }
}

/// `{"data": [...]}` envelope
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Body of a completed or accepted trigger
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
