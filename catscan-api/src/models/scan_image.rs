//! Artifact set for a scan session

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::artifact::{Artifact, ArtifactSlots, SlotKind};

/// Image artifacts for one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanImage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub slots: ArtifactSlots,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ScanImage {
    /// Skeleton row created alongside its session
    pub fn new(session_id: Uuid, slots: ArtifactSlots) -> Self {
        let now = catscan_common::time::now();
        Self {
            id: catscan_common::uuid_utils::generate(),
            session_id,
            slots,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Artifact handed to background removal: original, else ROI
    pub fn remove_bg_source(&self) -> Option<&Artifact> {
        self.slots
            .get(SlotKind::Original)
            .or_else(|| self.slots.get(SlotKind::Roi))
    }
}
