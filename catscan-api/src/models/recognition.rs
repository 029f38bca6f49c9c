//! Normalized recognition payload returned by `POST /scan/analyze`
//!
//! This is the stable shape clients see regardless of which upstream
//! response schema produced it.

use serde::Serialize;
use serde_json::Value;

/// Normalized recognition result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    pub ok: bool,
    pub request_id: String,
    /// True iff the photo shows a cat with exactly one detected face
    pub can_proceed: bool,
    pub message: String,
    /// ROI url, else preview url
    pub image_url: Option<String>,
    pub recognize: RecognizeSummary,
    pub faces: FaceSummary,
    pub meta: RecognitionMeta,
}

/// Raw classifier output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecognizeSummary {
    pub label: Option<String>,
    pub cat_prob: Option<f64>,
    pub threshold: Option<f64>,
    pub topk: Vec<Value>,
}

/// Face detection metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FaceSummary {
    pub ok: bool,
    pub faces_count: u32,
    pub chosen_conf: Option<f64>,
    #[serde(rename = "box")]
    pub bounding_box: Vec<f64>,
    pub note: Option<String>,
    pub kept_confs_ge_min: Vec<f64>,
    pub preview: Option<ArtifactRef>,
    pub roi: Option<ArtifactRef>,
    pub roi_upload_error: Option<String>,
}

/// Upstream artifact reference; the id may be missing in legacy responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    pub id: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecognitionMeta {
    pub api_latency_ms: u64,
    /// Upstream `meta` object, passed through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<Value>,
}
