//! Batch lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use veriroute_engine::mapping::FieldColumnMap;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Draft,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum SessionError {
    /// Preconditions for a transition are not met; the message is shown to
    /// the operator as-is.
    Validation(String),
    /// The requested transition is not part of the lifecycle.
    InvalidTransition {
        from: BatchStatus,
        to: BatchStatus,
    },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::InvalidTransition { from, to } => {
                write!(f, "cannot move a {from} batch to {to}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// One reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub name: String,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: BatchStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// `draft → processing`. Requires both datasets non-empty and a complete
    /// field coordinate-column mapping; rejected transitions carry an
    /// operator-facing message. A failed batch may re-enter processing for a
    /// whole-run retry.
    pub fn begin_processing(
        &mut self,
        system_count: usize,
        field_count: usize,
        field_columns: &FieldColumnMap,
    ) -> Result<(), SessionError> {
        match self.status {
            BatchStatus::Draft | BatchStatus::Failed => {}
            from => {
                return Err(SessionError::InvalidTransition {
                    from,
                    to: BatchStatus::Processing,
                })
            }
        }

        if system_count == 0 {
            return Err(SessionError::Validation(
                "upload the system dataset before processing".into(),
            ));
        }
        if field_count == 0 {
            return Err(SessionError::Validation(
                "upload the field dataset before processing".into(),
            ));
        }
        if !field_columns.is_complete() {
            return Err(SessionError::Validation(
                "map the field dataset's id, latitude, and longitude columns before processing"
                    .into(),
            ));
        }

        self.transition(BatchStatus::Processing);
        Ok(())
    }

    /// `processing → completed`: every item finalized, including per-item
    /// errors.
    pub fn complete(&mut self) -> Result<(), SessionError> {
        if self.status != BatchStatus::Processing {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: BatchStatus::Completed,
            });
        }
        self.transition(BatchStatus::Completed);
        Ok(())
    }

    /// `processing → failed`: the run itself could not proceed.
    pub fn fail(&mut self) -> Result<(), SessionError> {
        if self.status != BatchStatus::Processing {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: BatchStatus::Failed,
            });
        }
        self.transition(BatchStatus::Failed);
        Ok(())
    }

    fn transition(&mut self, to: BatchStatus) {
        self.status = to;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_columns() -> FieldColumnMap {
        FieldColumnMap {
            id: "connote".into(),
            lat: "lat".into(),
            lng: "lng".into(),
        }
    }

    #[test]
    fn happy_path_lifecycle() {
        let mut batch = Batch::new("January deliveries");
        assert_eq!(batch.status, BatchStatus::Draft);

        batch.begin_processing(10, 10, &complete_columns()).unwrap();
        assert_eq!(batch.status, BatchStatus::Processing);

        batch.complete().unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
    }

    #[test]
    fn empty_datasets_are_rejected_with_a_message() {
        let mut batch = Batch::new("b");
        let err = batch
            .begin_processing(0, 5, &complete_columns())
            .unwrap_err();
        assert!(err.to_string().contains("system dataset"));
        assert_eq!(batch.status, BatchStatus::Draft);

        let err = batch
            .begin_processing(5, 0, &complete_columns())
            .unwrap_err();
        assert!(err.to_string().contains("field dataset"));
    }

    #[test]
    fn incomplete_field_columns_are_rejected() {
        let mut batch = Batch::new("b");
        let columns = FieldColumnMap {
            id: "connote".into(),
            lat: "".into(),
            lng: "lng".into(),
        };
        let err = batch.begin_processing(5, 5, &columns).unwrap_err();
        assert!(err.to_string().contains("latitude"));
        assert_eq!(batch.status, BatchStatus::Draft);
    }

    #[test]
    fn failed_run_can_be_retried_whole() {
        let mut batch = Batch::new("b");
        batch.begin_processing(1, 1, &complete_columns()).unwrap();
        batch.fail().unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);

        batch.begin_processing(1, 1, &complete_columns()).unwrap();
        assert_eq!(batch.status, BatchStatus::Processing);
    }

    #[test]
    fn completed_batch_cannot_reenter_processing() {
        let mut batch = Batch::new("b");
        batch.begin_processing(1, 1, &complete_columns()).unwrap();
        batch.complete().unwrap();

        let err = batch
            .begin_processing(1, 1, &complete_columns())
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
    }

    #[test]
    fn terminal_transitions_require_processing() {
        let mut batch = Batch::new("b");
        assert!(batch.complete().is_err());
        assert!(batch.fail().is_err());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(BatchStatus::Processing.as_str(), "processing");
        assert_eq!(BatchStatus::from_wire("failed"), Some(BatchStatus::Failed));
        assert_eq!(BatchStatus::from_wire("done"), None);
    }
}
