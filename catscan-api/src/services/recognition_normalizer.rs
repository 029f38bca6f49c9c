//! Shapes raw recognition bodies into [`RecognitionResult`]
//!
//! Both upstream schemas are declared here:
//! - nested: `faces.preview{id,url}`, `faces.roi{id,url}`, optionally a
//!   `recognize{label,cat_prob,threshold,topk}` object
//! - legacy flat: `preview_url`/`preview_id`/`roi_url`/`roi_id`, either at the
//!   top level or inside `faces`, and classifier fields at the top level
//!
//! The nested form wins whenever it carries a usable value.

use serde::Deserialize;
use serde_json::Value;

use super::recognition_gateway::{RecognitionError, RecognitionResponse};
use crate::models::{ArtifactRef, FaceSummary, RecognitionMeta, RecognitionResult, RecognizeSummary};

pub const MSG_NOT_A_CAT: &str = "not a cat";
pub const MSG_ONE_FACE: &str = "exactly one face detected";
pub const MSG_NO_FACE: &str = "no face detected";
pub const MSG_MANY_FACES: &str = "more than one face detected";

/// Threshold applied when the classifier reports a probability without one
pub const DEFAULT_CAT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Default, Deserialize)]
struct UpstreamRecognition {
    #[serde(default)]
    request_id: Option<Value>,
    #[serde(default)]
    recognize: Option<UpstreamClassifier>,
    #[serde(flatten)]
    classifier: UpstreamClassifier,
    #[serde(default)]
    faces: Option<UpstreamFaces>,
    #[serde(default)]
    meta: Option<Value>,
    #[serde(flatten)]
    legacy: LegacyFlatArtifacts,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamClassifier {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    cat_prob: Option<f64>,
    #[serde(default)]
    threshold: Option<f64>,
    #[serde(default)]
    topk: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamFaces {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    faces_count: Option<u32>,
    #[serde(default)]
    chosen_conf: Option<f64>,
    #[serde(default, rename = "box")]
    bounding_box: Option<Vec<f64>>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    kept_confs_ge_min: Option<Vec<f64>>,
    #[serde(default)]
    preview: Option<UpstreamArtifact>,
    #[serde(default)]
    roi: Option<UpstreamArtifact>,
    #[serde(default)]
    roi_upload_error: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    legacy: LegacyFlatArtifacts,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamArtifact {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyFlatArtifacts {
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    preview_id: Option<String>,
    #[serde(default)]
    roi_url: Option<String>,
    #[serde(default)]
    roi_id: Option<String>,
}

impl LegacyFlatArtifacts {
    fn preview(&self) -> Option<ArtifactRef> {
        artifact_ref(self.preview_id.clone(), self.preview_url.clone())
    }

    fn roi(&self) -> Option<ArtifactRef> {
        artifact_ref(self.roi_id.clone(), self.roi_url.clone())
    }
}

/// A reference needs a url; the id is optional
fn artifact_ref(id: Option<String>, url: Option<String>) -> Option<ArtifactRef> {
    let url = non_blank(url)?;
    Some(ArtifactRef {
        id: non_blank(id),
        url,
    })
}

fn nested_ref(artifact: &Option<UpstreamArtifact>) -> Option<ArtifactRef> {
    artifact
        .as_ref()
        .and_then(|a| artifact_ref(a.id.clone(), a.url.clone()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// True when the classifier output says "cat"
///
/// A non-blank label decides on its own (case-insensitive match on `cat`).
/// Without a label the probability is compared against the threshold.
pub fn is_cat(label: Option<&str>, cat_prob: Option<f64>, threshold: Option<f64>) -> bool {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(label) => label.eq_ignore_ascii_case("cat"),
        None => match cat_prob {
            Some(prob) => prob >= threshold.unwrap_or(DEFAULT_CAT_THRESHOLD),
            None => false,
        },
    }
}

/// Decision table; first match wins
pub fn decide(is_cat: bool, faces_count: u32) -> (bool, &'static str) {
    if !is_cat {
        return (false, MSG_NOT_A_CAT);
    }
    match faces_count {
        1 => (true, MSG_ONE_FACE),
        0 => (false, MSG_NO_FACE),
        _ => (false, MSG_MANY_FACES),
    }
}

/// Correlation id: body `request_id`, else the `X-Request-ID` header, else new
pub fn resolve_request_id(body_id: Option<&Value>, header_id: Option<&str>) -> String {
    let from_body = body_id.and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    from_body
        .or_else(|| header_id.map(str::to_string))
        .unwrap_or_else(|| catscan_common::uuid_utils::generate_random().to_string())
}

/// Build the public payload from a raw recognition answer
pub fn normalize(response: &RecognitionResponse) -> Result<RecognitionResult, RecognitionError> {
    let upstream: UpstreamRecognition = serde_json::from_value(response.body.clone())
        .map_err(|e| RecognitionError::InvalidResponse(format!("unexpected body shape: {}", e)))?;

    let request_id = resolve_request_id(
        upstream.request_id.as_ref(),
        response.header_request_id.as_deref(),
    );

    // nested classifier fields first, flat ones as fallback
    let nested = upstream.recognize.unwrap_or_default();
    let flat = upstream.classifier;
    let recognize = RecognizeSummary {
        label: non_blank(nested.label).or_else(|| non_blank(flat.label)),
        cat_prob: nested.cat_prob.or(flat.cat_prob),
        threshold: nested.threshold.or(flat.threshold),
        topk: nested.topk.or(flat.topk).unwrap_or_default(),
    };

    let faces_present = upstream.faces.is_some();
    let faces = upstream.faces.unwrap_or_default();

    let preview = nested_ref(&faces.preview)
        .or_else(|| faces.legacy.preview())
        .or_else(|| upstream.legacy.preview());
    let roi = nested_ref(&faces.roi)
        .or_else(|| faces.legacy.roi())
        .or_else(|| upstream.legacy.roi());

    let image_url = roi
        .as_ref()
        .or(preview.as_ref())
        .map(|artifact| artifact.url.clone());

    let faces_count = faces.faces_count.unwrap_or(0);
    let face_summary = FaceSummary {
        ok: faces.ok.unwrap_or(faces_present),
        faces_count,
        chosen_conf: faces.chosen_conf,
        bounding_box: faces.bounding_box.unwrap_or_default(),
        note: faces.note,
        kept_confs_ge_min: faces.kept_confs_ge_min.unwrap_or_default(),
        preview,
        roi,
        roi_upload_error: non_blank(faces.roi_upload_error).or_else(|| non_blank(faces.error)),
    };

    let cat = is_cat(
        recognize.label.as_deref(),
        recognize.cat_prob,
        recognize.threshold,
    );
    let (can_proceed, message) = decide(cat, faces_count);

    Ok(RecognitionResult {
        ok: true,
        request_id,
        can_proceed,
        message: message.to_string(),
        image_url,
        recognize,
        faces: face_summary,
        meta: RecognitionMeta {
            api_latency_ms: response.latency_ms,
            upstream: upstream.meta,
        },
    })
}
