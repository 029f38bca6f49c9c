//! Evaluation outcome recorded by the analysis worker

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::artifact::{Artifact, ArtifactSlots};

/// One evaluation outcome for a session (1:1)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub id: Uuid,
    pub session_id: Uuid,
    pub remarks: Option<String>,
    pub landmark: Option<Artifact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ScanResult {
    pub fn new(session_id: Uuid, remarks: Option<String>, landmark: Option<Artifact>) -> Self {
        let now = catscan_common::time::now();
        Self {
            id: catscan_common::uuid_utils::generate(),
            session_id,
            remarks,
            landmark,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Finding for one anatomical area
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResultDetail {
    pub id: Uuid,
    pub result_id: Uuid,
    /// e.g. "eyes", "ears", "skin"
    pub area_name: String,
    /// Probability in [0, 1]
    pub confidence_score: Option<f64>,
    /// Canonically "Normal"/"Abnormal"
    pub label: String,
    pub description: Option<String>,
    pub advice: Option<String>,
    /// roi and heatmap slots
    pub slots: ArtifactSlots,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields supplied for a new detail
#[derive(Debug, Clone)]
pub struct NewResultDetail {
    pub area_name: String,
    pub confidence_score: Option<f64>,
    pub label: String,
    pub description: Option<String>,
    pub advice: Option<String>,
    pub slots: ArtifactSlots,
}

impl NewResultDetail {
    pub fn validate(&self) -> Result<(), String> {
        if self.area_name.trim().is_empty() {
            return Err("area_name is required".to_string());
        }
        if self.label.trim().is_empty() {
            return Err(format!("label is required for area '{}'", self.area_name));
        }
        if let Some(score) = self.confidence_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(format!(
                    "confidence_score for area '{}' must be within [0, 1], got {}",
                    self.area_name, score
                ));
            }
        }
        Ok(())
    }
}

impl ScanResultDetail {
    pub fn new(result_id: Uuid, fields: NewResultDetail) -> Self {
        let now = catscan_common::time::now();
        Self {
            id: catscan_common::uuid_utils::generate(),
            result_id,
            area_name: fields.area_name,
            confidence_score: fields.confidence_score,
            label: fields.label,
            description: fields.description,
            advice: fields.advice,
            slots: fields.slots,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
