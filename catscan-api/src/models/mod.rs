//! Data models for the scan service
//!
//! Enumerations persisted as text decode through `FromStr`, which rejects
//! unknown values instead of defaulting.

pub mod artifact;
pub mod cat;
pub mod checkup_report;
pub mod recognition;
pub mod scan_image;
pub mod scan_result;
pub mod scan_session;

pub use artifact::{Artifact, ArtifactError, ArtifactInput, ArtifactSlots, SlotKind};
pub use cat::Cat;
pub use checkup_report::{CheckupReport, ReportCategory, ReportStatus};
pub use recognition::{ArtifactRef, FaceSummary, RecognitionMeta, RecognitionResult, RecognizeSummary};
pub use scan_image::ScanImage;
pub use scan_result::{NewResultDetail, ScanResult, ScanResultDetail};
pub use scan_session::{
    CheckupType, Geolocation, NewScanSession, ScanSession, SessionStatus, StatusChange,
};

use thiserror::Error;

/// A stored or submitted string that names no known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl From<UnknownVariant> for catscan_common::Error {
    fn from(err: UnknownVariant) -> Self {
        catscan_common::Error::Internal(format!("Corrupt stored value: {}", err))
    }
}
