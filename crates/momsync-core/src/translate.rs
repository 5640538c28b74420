//! Value translation between the planning system (MoM) and the execution
//! repository (OTDB).
//!
//! Every function is total over its input: a value that cannot be mapped is
//! reported as [`UnmappedValue`] and never panics.
//!
//! | domain        | planning            | execution          |
//! |---------------|---------------------|--------------------|
//! | status        | `specified`         | `approved`         |
//! | clock mode    | `160 MHz`           | `<<ClockMode160`   |
//! | antenna array | `HBA Dual`          | `HBA`              |
//! | antenna set   | `HBA Dual`          | `HBA_DUAL`         |
//! | band filter   | `110-190 MHz` + HBA | `HBA_110_190`      |

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Domain, UnmappedValue};
use crate::types::{ExecutionStatus, PlanningStatus};

const CLOCK_MODE_PREFIX: &str = "<<ClockMode";

static MHZ_RE: OnceLock<Regex> = OnceLock::new();
static RANGE_RE: OnceLock<Regex> = OnceLock::new();

fn mhz_re() -> &'static Regex {
    MHZ_RE.get_or_init(|| Regex::new(r"(\d+)\s*MHz").expect("static regex"))
}

fn range_re() -> &'static Regex {
    RANGE_RE.get_or_init(|| Regex::new(r"(\d+)\s*-\s*(\d+)").expect("static regex"))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

pub fn to_execution_status(planning: &str) -> Result<ExecutionStatus, UnmappedValue> {
    planning
        .trim()
        .parse::<PlanningStatus>()
        .map(PlanningStatus::to_execution)
}

pub fn to_planning_status(execution: &str) -> Result<PlanningStatus, UnmappedValue> {
    execution
        .trim()
        .parse::<ExecutionStatus>()
        .map(ExecutionStatus::to_planning)
}

/// Local name of the status element the planning system expects:
/// words are joined in camelCase and suffixed with `Status`
/// (`being specified` → `beingSpecifiedStatus`).
pub fn status_element_name(words: &str) -> String {
    let mut name = String::with_capacity(words.len() + 6);
    for (i, word) in words.split_whitespace().enumerate() {
        let mut chars = word.chars();
        let Some(first) = chars.next() else { continue };
        if i == 0 {
            name.extend(first.to_lowercase());
        } else {
            name.extend(first.to_uppercase());
        }
        name.push_str(chars.as_str());
    }
    name.push_str("Status");
    name
}

// ---------------------------------------------------------------------------
// Clock mode
// ---------------------------------------------------------------------------

pub fn to_execution_clock_mode(planning: &str) -> Result<String, UnmappedValue> {
    mhz_re()
        .captures(planning)
        .map(|c| format!("{CLOCK_MODE_PREFIX}{}", &c[1]))
        .ok_or_else(|| UnmappedValue::new(Domain::ClockMode, planning))
}

pub fn to_planning_clock_mode(execution: &str) -> Result<String, UnmappedValue> {
    execution
        .trim()
        .strip_prefix(CLOCK_MODE_PREFIX)
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .map(|n| format!("{n} MHz"))
        .ok_or_else(|| UnmappedValue::new(Domain::ClockMode, execution))
}

// ---------------------------------------------------------------------------
// Antenna
// ---------------------------------------------------------------------------

/// First three characters of the antenna descriptor, upper-cased.
pub fn to_execution_antenna_array(antenna: &str) -> Result<String, UnmappedValue> {
    let code: String = antenna.trim().chars().take(3).collect();
    if code.chars().count() < 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(UnmappedValue::new(Domain::AntennaArray, antenna));
    }
    Ok(code.to_ascii_uppercase())
}

/// Antenna descriptor upper-cased with spaces replaced by underscores.
pub fn to_execution_antenna_set(antenna: &str) -> Result<String, UnmappedValue> {
    let words: Vec<&str> = antenna.split_whitespace().collect();
    if words.is_empty() {
        return Err(UnmappedValue::new(Domain::AntennaSet, antenna));
    }
    Ok(words.join("_").to_uppercase())
}

/// `HBA_DUAL` → `HBA Dual`. The array code keeps its case, the remaining
/// words are capitalized.
pub fn to_planning_antenna(antenna_set: &str) -> Result<String, UnmappedValue> {
    let mut parts = antenna_set.trim().split('_').filter(|p| !p.is_empty());
    let Some(array) = parts.next() else {
        return Err(UnmappedValue::new(Domain::AntennaSet, antenna_set));
    };
    if to_execution_antenna_array(array).is_err() {
        return Err(UnmappedValue::new(Domain::AntennaSet, antenna_set));
    }
    let mut words = vec![array.to_ascii_uppercase()];
    for part in parts {
        let lower = part.to_lowercase();
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            words.push(first.to_uppercase().chain(chars).collect());
        }
    }
    Ok(words.join(" "))
}

// ---------------------------------------------------------------------------
// Band filter
// ---------------------------------------------------------------------------

/// Array code joined with the numeric range of the instrument filter,
/// hyphen replaced by underscore (`HBA` + `110-190 MHz` → `HBA_110_190`).
pub fn to_execution_band_filter(array: &str, filter: &str) -> Result<String, UnmappedValue> {
    let array = to_execution_antenna_array(array)
        .map_err(|_| UnmappedValue::new(Domain::BandFilter, format!("{array}/{filter}")))?;
    range_re()
        .captures(filter)
        .map(|c| format!("{array}_{}_{}", &c[1], &c[2]))
        .ok_or_else(|| UnmappedValue::new(Domain::BandFilter, filter))
}

pub fn to_planning_band_filter(band_filter: &str) -> Result<String, UnmappedValue> {
    let unmapped = || UnmappedValue::new(Domain::BandFilter, band_filter);
    let mut parts = band_filter.trim().splitn(3, '_');
    let (Some(_array), Some(low), Some(high)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(unmapped());
    };
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !numeric(low) || !numeric(high) {
        return Err(unmapped());
    }
    Ok(format!("{low}-{high} MHz"))
}
