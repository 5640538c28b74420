use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subbands::Subbands;
use crate::types::ExecutionStatus;

// ---------------------------------------------------------------------------
// Beam
// ---------------------------------------------------------------------------

/// A UV measurement of an observation: one pointing with its own duration
/// and subband allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mom2_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ra: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equinox: Option<String>,
    /// Requested duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subbands: Option<Subbands>,
}

// ---------------------------------------------------------------------------
// ObservationRecord
// ---------------------------------------------------------------------------

/// One observation in execution-repository terms, the pivot between the
/// two XML vocabularies.
///
/// Mapped fields hold execution values (`HBA_DUAL`, `<<ClockMode160`);
/// the codecs translate at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Planning-system identifier; `None` when the push carried no `mom2Id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mom2_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antenna_array: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antenna_set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_set: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub beams: Vec<Beam>,
    /// Per-beam start offsets (`+<seconds>`) relative to `start_time`,
    /// positionally correlated with `beams`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub angle_times: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObservationRecord {
    pub fn beam(&self, mom2_id: i64) -> Option<&Beam> {
        self.beams.iter().find(|b| b.mom2_id == Some(mom2_id))
    }
}

/// Parse one angle-time token (`+3600`, `-5`, `+12.5`) into whole seconds.
pub fn parse_offset(token: &str) -> Option<i64> {
    let t = token.trim();
    let t = t.strip_prefix('+').unwrap_or(t);
    if let Ok(n) = t.parse::<i64>() {
        return Some(n);
    }
    t.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc() as i64)
}

/// Split an OTDB angle-time list (`[+0,+3600,+7200]`) into its tokens.
pub fn split_angle_times(list: &str) -> Vec<String> {
    list.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
