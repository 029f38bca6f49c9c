//! Service modules for the scan pipeline
//!
//! Upstream clients sit behind traits (`RecognitionGateway`, `ArtifactStore`)
//! so the orchestrator can run against in-process fakes in tests.

pub mod artifact_store;
pub mod health_score;
pub mod recognition_gateway;
pub mod recognition_normalizer;
pub mod report_aggregator;
pub mod scan_orchestrator;
pub mod upload_validator;

pub use artifact_store::{ArtifactStore, ArtifactStoreError, HttpArtifactStore, StoredArtifact};
pub use recognition_gateway::{
    GatewaySettings, HttpRecognitionGateway, RecognitionError, RecognitionGateway, RecognitionResponse,
    RemoveBgArtifact,
};
pub use report_aggregator::ReportAggregator;
pub use scan_orchestrator::ScanOrchestrator;
pub use upload_validator::{UploadRejection, UploadRules, UploadedFile};
