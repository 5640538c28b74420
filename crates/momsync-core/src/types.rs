use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Domain, UnmappedValue};

// ---------------------------------------------------------------------------
// PlanningStatus
// ---------------------------------------------------------------------------

/// Lifecycle status as the planning system (MoM) names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningStatus {
    Described,
    Specified,
    Active,
    Finished,
    Aborted,
    Failed,
}

impl PlanningStatus {
    pub fn all() -> &'static [PlanningStatus] {
        &[
            PlanningStatus::Described,
            PlanningStatus::Specified,
            PlanningStatus::Active,
            PlanningStatus::Finished,
            PlanningStatus::Aborted,
            PlanningStatus::Failed,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanningStatus::Described => "described",
            PlanningStatus::Specified => "specified",
            PlanningStatus::Active => "active",
            PlanningStatus::Finished => "finished",
            PlanningStatus::Aborted => "aborted",
            PlanningStatus::Failed => "failed",
        }
    }

    pub fn to_execution(self) -> ExecutionStatus {
        match self {
            PlanningStatus::Described => ExecutionStatus::BeingSpecified,
            PlanningStatus::Specified => ExecutionStatus::Approved,
            PlanningStatus::Active => ExecutionStatus::Running,
            PlanningStatus::Finished => ExecutionStatus::Finished,
            PlanningStatus::Aborted => ExecutionStatus::Aborted,
            PlanningStatus::Failed => ExecutionStatus::Failed,
        }
    }
}

impl fmt::Display for PlanningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanningStatus {
    type Err = UnmappedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanningStatus::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnmappedValue::new(Domain::Status, s))
    }
}

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

/// Lifecycle status as the execution repository (OTDB) names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    BeingSpecified,
    Approved,
    Running,
    Finished,
    Aborted,
    Failed,
}

impl ExecutionStatus {
    pub fn all() -> &'static [ExecutionStatus] {
        &[
            ExecutionStatus::BeingSpecified,
            ExecutionStatus::Approved,
            ExecutionStatus::Running,
            ExecutionStatus::Finished,
            ExecutionStatus::Aborted,
            ExecutionStatus::Failed,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::BeingSpecified => "being specified",
            ExecutionStatus::Approved => "approved",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Finished => "finished",
            ExecutionStatus::Aborted => "aborted",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn to_planning(self) -> PlanningStatus {
        match self {
            ExecutionStatus::BeingSpecified => PlanningStatus::Described,
            ExecutionStatus::Approved => PlanningStatus::Specified,
            ExecutionStatus::Running => PlanningStatus::Active,
            ExecutionStatus::Finished => PlanningStatus::Finished,
            ExecutionStatus::Aborted => PlanningStatus::Aborted,
            ExecutionStatus::Failed => PlanningStatus::Failed,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = UnmappedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExecutionStatus::all()
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnmappedValue::new(Domain::Status, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planning_status_parses_every_name() {
        for p in PlanningStatus::all() {
            assert_eq!(p.as_str().parse::<PlanningStatus>().unwrap(), *p);
        }
    }

    #[test]
    fn execution_status_keeps_spaces() {
        let e: ExecutionStatus = "being specified".parse().unwrap();
        assert_eq!(e, ExecutionStatus::BeingSpecified);
        assert_eq!(e.to_string(), "being specified");
    }

    #[test]
    fn unknown_status_is_unmapped() {
        let err = "scheduled".parse::<PlanningStatus>().unwrap_err();
        assert_eq!(err.domain, Domain::Status);
        assert_eq!(err.value, "scheduled");
    }
}
