use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CodecError;
use crate::model::ObservationRecord;
use crate::xml::outbound;

/// One queued, serialized outbound change notification.
///
/// Immutable once built; the queue only changes its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: Uuid,
    /// The originating observation, for logging.
    pub mom2_id: Option<i64>,
    pub payload: String,
    /// When the poll cycle that produced this task started.
    pub cycle_at: DateTime<Utc>,
}

impl Task {
    pub fn new(mom2_id: Option<i64>, payload: impl Into<String>, cycle_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mom2_id,
            payload: payload.into(),
            cycle_at,
        }
    }

    /// Serialize `record` with the outbound codec and wrap it. The planning
    /// system cannot import an observation it cannot identify, so a record
    /// without `mom2Id` is refused.
    pub fn from_record(
        record: &ObservationRecord,
        cycle_at: DateTime<Utc>,
    ) -> Result<Self, CodecError> {
        let mom2_id = record.mom2_id.ok_or(CodecError::MissingId)?;
        let payload = outbound::encode(record)?;
        Ok(Self::new(Some(mom2_id), payload, cycle_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_record_carries_id_and_payload() {
        let record = ObservationRecord {
            mom2_id: Some(9),
            ..Default::default()
        };
        let now = Utc::now();
        let task = Task::from_record(&record, now).unwrap();
        assert_eq!(task.mom2_id, Some(9));
        assert_eq!(task.cycle_at, now);
        assert!(task.payload.contains(r#"mom2Id="9""#));
    }

    #[test]
    fn record_without_id_is_refused() {
        let err = Task::from_record(&ObservationRecord::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, CodecError::MissingId));
    }

    #[test]
    fn every_task_gets_its_own_id() {
        let now = Utc::now();
        assert_ne!(Task::new(None, "", now).id, Task::new(None, "", now).id);
    }
}
