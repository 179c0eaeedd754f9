//! Defect filing and triage progression.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{EngineError, EngineResult};
use crate::model::{new_id, Defect, DefectStatus, Priority, ResultState};
use crate::store::RunStore;

pub struct DefectLinker {
    store: Arc<dyn RunStore>,
}

impl DefectLinker {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// File a defect against a FAIL result. The result link survives
    /// re-runs of the case since results are append-only.
    pub async fn file_from_result(
        &self,
        result_id: &str,
        title: &str,
        priority: Priority,
    ) -> EngineResult<Defect> {
        let result = self.store.result(result_id).await?;
        if result.state != ResultState::Fail {
            return Err(EngineError::InvalidConfiguration(format!(
                "defect requires a FAIL result, got {:?} for result {}",
                result.state, result_id
            )));
        }
        self.store
            .create_defect(Defect {
                id: new_id(),
                title: title.to_string(),
                priority,
                status: DefectStatus::Open,
                triggering_result_id: Some(result.id),
                created_at: Utc::now(),
            })
            .await
    }

    /// File a defect with no triggering result, e.g. from manual triage.
    pub async fn file_manual(&self, title: &str, priority: Priority) -> EngineResult<Defect> {
        self.store
            .create_defect(Defect {
                id: new_id(),
                title: title.to_string(),
                priority,
                status: DefectStatus::Open,
                triggering_result_id: None,
                created_at: Utc::now(),
            })
            .await
    }

    /// Move a defect one step forward through its lifecycle. Skipping
    /// stages or moving backwards is rejected.
    pub async fn advance(&self, defect_id: &str) -> EngineResult<Defect> {
        let defect = self.store.defect(defect_id).await?;
        let next = next_status(defect.status).ok_or(EngineError::InvalidTransition {
            entity: "defect",
            from: format!("{:?}", defect.status),
            event: "advance".to_string(),
        })?;
        self.store.set_defect_status(defect_id, next).await
    }
}

fn next_status(status: DefectStatus) -> Option<DefectStatus> {
    match status {
        DefectStatus::Open => Some(DefectStatus::InProgress),
        DefectStatus::InProgress => Some(DefectStatus::Resolved),
        DefectStatus::Resolved => Some(DefectStatus::Closed),
        DefectStatus::Closed => None,
    }
}
