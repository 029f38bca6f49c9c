//! Scan session orchestration
//!
//! Drives the write side of a scan: upload validation, upstream calls, and
//! the transactional updates to local state. Every operation validates its
//! input before touching the network or the database.
//!
//! Logging policy: validation failures at `debug`, upstream unavailability at
//! `error`, upstream contract violations at `warn`, persistence failures at
//! `error` with the session context.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::artifact_store::{ArtifactStore, ArtifactStoreError, DiscardOutcome, StoredArtifact};
use super::recognition_gateway::{RecognitionError, RecognitionGateway};
use super::recognition_normalizer;
use super::upload_validator::{validate_upload, UploadRules, UploadedFile};
use crate::context::CallerContext;
use crate::db::sessions::{DeleteMode, DeleteSummary};
use crate::db::{cats, checkup_reports, images, results, sessions};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Artifact, ArtifactInput, ArtifactSlots, Cat, CheckupReport, CheckupType, Geolocation,
    NewResultDetail, NewScanSession, RecognitionResult, ReportCategory, ScanImage, ScanResult,
    ScanResultDetail, ScanSession, SessionStatus, SlotKind, StatusChange,
};

/// Slot map as sent by clients
pub type SlotInputs = BTreeMap<String, Option<ArtifactInput>>;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// `POST /scan/sessions` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionDraft {
    #[serde(default)]
    pub scan_type: String,
    #[serde(default)]
    pub checkup_type: String,
    #[serde(default)]
    pub geolocation: Option<Geolocation>,
    #[serde(default)]
    pub informer: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub cat_id: Option<Uuid>,
    /// Slot name → artifact pair; `null` leaves the slot empty
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: SlotInputs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreatedSession {
    pub session_id: Uuid,
    pub image_id: Uuid,
}

/// Background-removed artifact as stored on the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveBgOutcome {
    pub id: String,
    pub url: String,
    pub bucket: Option<String>,
    pub cached: bool,
    pub hash: Option<String>,
    pub image_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub session_id: Uuid,
    pub status: SessionStatus,
    /// False when the session already had the requested status
    pub changed: bool,
}

/// `POST /scan/sessions/{id}/result` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultDraft {
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub landmark: Option<ArtifactInput>,
    #[serde(default)]
    pub details: Vec<DetailDraft>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailDraft {
    #[serde(default)]
    pub area_name: String,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub advice: Option<String>,
    /// `roi` and `heatmap` pairs
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: SlotInputs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedResult {
    pub result_id: Uuid,
    pub detail_ids: Vec<Uuid>,
    pub status: SessionStatus,
}

/// `POST /scan/sessions/{id}/reports` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportDraft {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

/// Write-side coordinator for scan sessions
pub struct ScanOrchestrator {
    db: SqlitePool,
    gateway: Arc<dyn RecognitionGateway>,
    store: Arc<dyn ArtifactStore>,
    upload_rules: UploadRules,
    default_bucket: String,
}

impl ScanOrchestrator {
    pub fn new(
        db: SqlitePool,
        gateway: Arc<dyn RecognitionGateway>,
        store: Arc<dyn ArtifactStore>,
        upload_rules: UploadRules,
        default_bucket: String,
    ) -> Self {
        Self {
            db,
            gateway,
            store,
            upload_rules,
            default_bucket,
        }
    }

    /// Validate a photo and run recognition on it; nothing is persisted
    pub async fn analyze(&self, file: Option<UploadedFile>) -> ApiResult<RecognitionResult> {
        let mime = validate_upload(file.as_ref(), &self.upload_rules).map_err(|rejection| {
            tracing::debug!(code = rejection.code(), "Analyze upload rejected");
            ApiError::from(rejection)
        })?;
        // validate_upload only succeeds with a file present
        let file = file.ok_or(ApiError::Upload(
            super::upload_validator::UploadRejection::InvalidFile,
        ))?;

        tracing::debug!(mime = %mime, bytes = file.bytes.len(), "Forwarding photo to recognition");

        let response = self.gateway.recognize(&file).await.map_err(|e| {
            log_recognition_error("recognize", None, &e);
            ApiError::from(e)
        })?;

        let result = recognition_normalizer::normalize(&response).map_err(|e| {
            log_recognition_error("recognize", None, &e);
            ApiError::from(e)
        })?;

        tracing::info!(
            request_id = %result.request_id,
            can_proceed = result.can_proceed,
            faces_count = result.faces.faces_count,
            latency_ms = result.meta.api_latency_ms,
            "Recognition finished: {}",
            result.message
        );

        Ok(result)
    }

    /// Persist a new session with its image skeleton in one transaction
    pub async fn store_session(&self, ctx: &CallerContext, draft: SessionDraft) -> ApiResult<CreatedSession> {
        let (fields, slots) = validate_session_draft(ctx, draft).map_err(|e| {
            tracing::debug!(error = %e, "Session payload rejected");
            e
        })?;

        if let Some(cat_id) = fields.cat_id {
            // validate_session_draft guarantees a user when cat_id is set
            let owner = ctx.require_user()?;
            let cat = cats::find_cat_for_owner(&self.db, cat_id, owner)
                .await
                .map_err(|e| {
                    tracing::error!(cat_id = %cat_id, error = %e, "Cat lookup failed");
                    ApiError::persistence("SESSION_CREATE_FAILED", "Failed to create scan session", &e)
                })?;
            if cat.is_none() {
                tracing::debug!(cat_id = %cat_id, "Session references unknown cat");
                return Err(ApiError::Validation(format!("unknown cat_id: {}", cat_id)));
            }
        }

        let session = ScanSession::new(fields);
        let image = ScanImage::new(session.id, slots);

        let persisted: catscan_common::Result<()> = async {
            let mut tx = self.db.begin().await?;
            sessions::insert_session(&mut *tx, &session).await?;
            images::insert_image(&mut *tx, &image).await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(e) = persisted {
            tracing::error!(
                session_id = %session.id,
                owner_id = ?session.owner_id,
                scan_type = %session.scan_type,
                checkup_type = %session.checkup_type,
                slots = image.slots.len(),
                error = %e,
                "Failed to create scan session"
            );
            return Err(ApiError::persistence(
                "SESSION_CREATE_FAILED",
                "Failed to create scan session",
                &e,
            ));
        }

        tracing::info!(
            session_id = %session.id,
            image_id = %image.id,
            guest = session.owner_id.is_none(),
            "Scan session created"
        );

        Ok(CreatedSession {
            session_id: session.id,
            image_id: image.id,
        })
    }

    /// Remove the background of the session's latest image
    pub async fn process_remove_bg(&self, session_id: Uuid) -> ApiResult<RemoveBgOutcome> {
        let session = sessions::find_session(&self.db, session_id).await?;
        if session.is_none() {
            return Err(ApiError::not_found("SESSION_NOT_FOUND", "Scan session not found"));
        }

        let image = images::latest_image_for_session(&self.db, session_id)
            .await?
            .ok_or_else(|| ApiError::bad_request("IMAGE_NOT_FOUND", "Scan session has no image"))?;

        let source = image.remove_bg_source().cloned().ok_or_else(|| {
            ApiError::bad_request(
                "SOURCE_IMAGE_MISSING",
                "Scan image has no original or ROI artifact to process",
            )
        })?;

        let produced = self
            .gateway
            .remove_background(&source.url)
            .await
            .map_err(|e| {
                log_recognition_error("remove-bg", Some(session_id), &e);
                ApiError::from(e)
            })?;

        let artifact = Artifact {
            id: produced.id.clone(),
            url: produced.url.clone(),
        };
        let written = images::write_slot(
            &self.db,
            image.id,
            SlotKind::RemoveBg,
            &artifact,
            catscan_common::time::now(),
        )
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session_id, image_id = %image.id, error = %e, "Failed to store remove-bg artifact");
            ApiError::persistence("REMOVE_BG_PERSIST_FAILED", "Failed to store processed image", &e)
        })?;

        if !written {
            return Err(ApiError::bad_request(
                "IMAGE_NOT_FOUND",
                "Scan image was removed while processing",
            ));
        }

        tracing::info!(
            session_id = %session_id,
            image_id = %image.id,
            artifact_id = %produced.id,
            cached = produced.cached,
            "Background removed"
        );

        Ok(RemoveBgOutcome {
            id: produced.id,
            url: produced.url,
            bucket: produced.bucket,
            cached: produced.cached,
            hash: produced.hash,
            image_id: image.id,
        })
    }

    /// Soft- or hard-delete a session aggregate
    pub async fn delete_session(&self, session_id: Uuid, mode: DeleteMode) -> ApiResult<DeleteSummary> {
        sessions::delete_session_cascade(&self.db, session_id, mode)
            .await
            .map_err(|e| {
                tracing::error!(session_id = %session_id, mode = ?mode, error = %e, "Session delete failed");
                ApiError::persistence("SESSION_DELETE_FAILED", "Failed to delete scan session", &e)
            })
    }

    /// Move a session to a terminal status
    pub async fn update_status(&self, session_id: Uuid, requested: &str) -> ApiResult<StatusUpdate> {
        let next: SessionStatus = requested
            .trim()
            .parse()
            .map_err(|e: crate::models::UnknownVariant| ApiError::Validation(e.to_string()))?;

        let session = sessions::find_session(&self.db, session_id)
            .await?
            .ok_or_else(|| ApiError::not_found("SESSION_NOT_FOUND", "Scan session not found"))?;

        match session.status.transition_to(next) {
            StatusChange::Unchanged => Ok(StatusUpdate {
                session_id,
                status: session.status,
                changed: false,
            }),
            StatusChange::Rejected { from, to } => {
                tracing::debug!(session_id = %session_id, from = %from, to = %to, "Status transition rejected");
                Err(invalid_transition(from, to))
            }
            StatusChange::Applied { from, to } => {
                let updated =
                    sessions::update_status(&self.db, session_id, from, to, catscan_common::time::now()).await?;
                if !updated {
                    return Err(ApiError::conflict(
                        "INVALID_STATUS_TRANSITION",
                        "Session status changed concurrently",
                    ));
                }
                tracing::info!(session_id = %session_id, from = %from, to = %to, "Session status updated");
                Ok(StatusUpdate {
                    session_id,
                    status: to,
                    changed: true,
                })
            }
        }
    }

    /// Record the analysis outcome of a session
    ///
    /// A `processing` session moves to `done` in the same transaction.
    pub async fn record_result(&self, session_id: Uuid, draft: ResultDraft) -> ApiResult<RecordedResult> {
        let (remarks, landmark, details) = validate_result_draft(draft).map_err(|e| {
            tracing::debug!(session_id = %session_id, error = %e, "Result payload rejected");
            e
        })?;

        let session = sessions::find_session(&self.db, session_id)
            .await?
            .ok_or_else(|| ApiError::not_found("SESSION_NOT_FOUND", "Scan session not found"))?;

        if session.status == SessionStatus::Failed {
            return Err(invalid_transition(SessionStatus::Failed, SessionStatus::Done));
        }

        let mut tx = self.db.begin().await.map_err(catscan_common::Error::from)?;

        if results::find_result_for_session(&mut *tx, session_id, true).await?.is_some() {
            return Err(ApiError::conflict(
                "RESULT_ALREADY_EXISTS",
                "A result has already been recorded for this session",
            ));
        }

        let result = ScanResult::new(session_id, remarks, landmark);
        let details: Vec<ScanResultDetail> = details
            .into_iter()
            .map(|fields| ScanResultDetail::new(result.id, fields))
            .collect();

        // Ok(None): the session left `processing` mid-transaction; dropping tx rolls back
        let persisted: catscan_common::Result<Option<SessionStatus>> = async {
            results::insert_result(&mut *tx, &result).await?;
            for detail in &details {
                results::insert_detail(&mut *tx, detail).await?;
            }
            let status = if session.status == SessionStatus::Processing {
                let moved = sessions::update_status(
                    &mut *tx,
                    session_id,
                    SessionStatus::Processing,
                    SessionStatus::Done,
                    catscan_common::time::now(),
                )
                .await?;
                if !moved {
                    return Ok(None);
                }
                SessionStatus::Done
            } else {
                session.status
            };
            tx.commit().await?;
            Ok(Some(status))
        }
        .await;

        let status = persisted.map_err(|e| {
            tracing::error!(session_id = %session_id, details = details.len(), error = %e, "Failed to record scan result");
            ApiError::persistence("RESULT_CREATE_FAILED", "Failed to record scan result", &e)
        })?;

        let Some(status) = status else {
            let current = sessions::find_session(&self.db, session_id)
                .await?
                .map(|s| s.status)
                .unwrap_or(SessionStatus::Processing);
            tracing::warn!(session_id = %session_id, status = %current, "Session status changed while recording result");
            return Err(invalid_transition(current, SessionStatus::Done));
        };

        tracing::info!(
            session_id = %session_id,
            result_id = %result.id,
            details = details.len(),
            "Scan result recorded"
        );

        Ok(RecordedResult {
            result_id: result.id,
            detail_ids: details.iter().map(|d| d.id).collect(),
            status,
        })
    }

    /// Attach unowned guest sessions to the calling user
    pub async fn claim_sessions(&self, ctx: &CallerContext, session_ids: Vec<Uuid>) -> ApiResult<u64> {
        let owner = ctx.require_user()?;
        if session_ids.is_empty() {
            return Err(ApiError::Validation("session_ids must not be empty".to_string()));
        }

        let claimed = sessions::claim_sessions(&self.db, &session_ids, owner).await?;
        tracing::info!(owner_id = %owner, requested = session_ids.len(), claimed, "Guest sessions claimed");
        Ok(claimed)
    }

    pub async fn create_cat(&self, ctx: &CallerContext, name: &str) -> ApiResult<Cat> {
        let owner = ctx.require_user()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("name is required".to_string()));
        }

        let cat = Cat::new(owner.to_string(), name.to_string());
        cats::insert_cat(&self.db, &cat).await?;
        tracing::info!(cat_id = %cat.id, owner_id = %owner, "Cat registered");
        Ok(cat)
    }

    pub async fn list_cats(&self, ctx: &CallerContext) -> ApiResult<Vec<Cat>> {
        let owner = ctx.require_user()?;
        Ok(cats::list_cats_for_owner(&self.db, owner).await?)
    }

    /// File a complaint about a session's result
    pub async fn submit_report(
        &self,
        ctx: &CallerContext,
        session_id: Uuid,
        draft: ReportDraft,
    ) -> ApiResult<CheckupReport> {
        let category: ReportCategory = draft
            .category
            .trim()
            .parse()
            .map_err(|e: crate::models::UnknownVariant| ApiError::Validation(e.to_string()))?;

        if sessions::find_session(&self.db, session_id).await?.is_none() {
            return Err(ApiError::not_found("SESSION_NOT_FOUND", "Scan session not found"));
        }

        let report = CheckupReport::new(
            session_id,
            ctx.user_id.clone(),
            category,
            draft.reasons,
            non_blank(draft.description),
            non_blank(draft.contact),
        );

        checkup_reports::insert_report(&self.db, &report).await.map_err(|e| {
            tracing::error!(session_id = %session_id, error = %e, "Failed to store checkup report");
            ApiError::persistence("REPORT_CREATE_FAILED", "Failed to submit report", &e)
        })?;

        tracing::info!(session_id = %session_id, report_id = %report.id, category = %category, "Checkup report submitted");
        Ok(report)
    }

    pub async fn list_reports(&self, session_id: Uuid) -> ApiResult<Vec<CheckupReport>> {
        if sessions::find_session(&self.db, session_id).await?.is_none() {
            return Err(ApiError::not_found("SESSION_NOT_FOUND", "Scan session not found"));
        }
        Ok(checkup_reports::list_reports_for_session(&self.db, session_id).await?)
    }

    /// Validate a client artifact and forward it to the store
    pub async fn upload_artifact(
        &self,
        bucket: Option<String>,
        file: Option<UploadedFile>,
    ) -> ApiResult<StoredArtifact> {
        validate_upload(file.as_ref(), &self.upload_rules).map_err(|rejection| {
            tracing::debug!(code = rejection.code(), "Artifact upload rejected");
            ApiError::from(rejection)
        })?;
        let file = file.ok_or(ApiError::Upload(
            super::upload_validator::UploadRejection::InvalidFile,
        ))?;

        let bucket = non_blank(bucket).unwrap_or_else(|| self.default_bucket.clone());
        let stored = self.store.upload(&bucket, &file).await.map_err(|e| {
            log_store_error("upload", &e);
            ApiError::from(e)
        })?;

        tracing::info!(artifact_id = %stored.id, bucket = %bucket, "Artifact uploaded");
        Ok(stored)
    }

    /// Delete artifacts the client uploaded but will not use
    pub async fn discard_artifacts(&self, ids: Vec<String>) -> ApiResult<DiscardOutcome> {
        let mut unique: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids.into_iter().map(|id| id.trim().to_string()) {
            if !id.is_empty() && !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.is_empty() {
            return Err(ApiError::Validation("ids must not be empty".to_string()));
        }

        let outcome = self.store.delete_selected(&unique).await.map_err(|e| {
            log_store_error("delete", &e);
            ApiError::from(e)
        })?;

        tracing::info!(count = unique.len(), "Artifacts discarded");
        Ok(outcome)
    }
}

/// Check a session payload without side effects
fn validate_session_draft(
    ctx: &CallerContext,
    draft: SessionDraft,
) -> ApiResult<(NewScanSession, ArtifactSlots)> {
    let scan_type = draft.scan_type.trim().to_string();
    if scan_type.is_empty() {
        return Err(ApiError::Validation("scan_type is required".to_string()));
    }

    let checkup_type: CheckupType = draft
        .checkup_type
        .trim()
        .parse()
        .map_err(|e: crate::models::UnknownVariant| ApiError::Validation(e.to_string()))?;

    let geolocation = draft.geolocation.unwrap_or_default();
    geolocation.validate().map_err(ApiError::Validation)?;

    if draft.cat_id.is_some() && ctx.is_guest() {
        return Err(ApiError::Validation(
            "cat_id requires a signed-in user".to_string(),
        ));
    }

    let slots = parse_slots(draft.images, &SlotKind::IMAGE_SLOTS)?;

    Ok((
        NewScanSession {
            owner_id: ctx.user_id.clone(),
            cat_id: draft.cat_id,
            scan_type,
            checkup_type,
            geolocation,
            informer: non_blank(draft.informer),
            notes: non_blank(draft.notes),
        },
        slots,
    ))
}

fn validate_result_draft(
    draft: ResultDraft,
) -> ApiResult<(Option<String>, Option<Artifact>, Vec<NewResultDetail>)> {
    let landmark = match draft.landmark {
        Some(input) => Artifact::from_parts(SlotKind::Landmark, input.id, input.url)
            .map_err(|e| ApiError::Validation(e.to_string()))?,
        None => None,
    };

    let mut details = Vec::with_capacity(draft.details.len());
    for detail in draft.details {
        let fields = NewResultDetail {
            area_name: detail.area_name.trim().to_string(),
            confidence_score: detail.confidence_score,
            label: detail.label.trim().to_string(),
            description: non_blank(detail.description),
            advice: non_blank(detail.advice),
            slots: parse_slots(detail.images, &SlotKind::DETAIL_SLOTS)?,
        };
        fields.validate().map_err(ApiError::Validation)?;
        details.push(fields);
    }

    Ok((non_blank(draft.remarks), landmark, details))
}

/// Slot-name keyed wire input to a validated slot map
fn parse_slots(raw: SlotInputs, allowed: &[SlotKind]) -> ApiResult<ArtifactSlots> {
    let mut inputs = BTreeMap::new();
    for (name, input) in raw {
        let slot: SlotKind = name
            .parse()
            .map_err(|e: crate::models::UnknownVariant| ApiError::Validation(e.to_string()))?;
        if let Some(input) = input {
            inputs.insert(slot, input);
        }
    }
    ArtifactSlots::from_inputs(inputs, allowed).map_err(|e| ApiError::Validation(e.to_string()))
}

fn invalid_transition(from: SessionStatus, to: SessionStatus) -> ApiError {
    ApiError::conflict(
        "INVALID_STATUS_TRANSITION",
        format!("Cannot change session status from {} to {}", from, to),
    )
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn log_recognition_error(operation: &str, session_id: Option<Uuid>, err: &RecognitionError) {
    let session = session_id.map(|id| id.to_string()).unwrap_or_default();
    match err {
        RecognitionError::Unreachable(_) => {
            tracing::error!(operation, session_id = %session, error = %err, "Recognition service unavailable")
        }
        _ => tracing::warn!(operation, session_id = %session, error = %err, "Recognition service contract violation"),
    }
}

fn log_store_error(operation: &str, err: &ArtifactStoreError) {
    match err {
        ArtifactStoreError::Unreachable(_) => {
            tracing::error!(operation, error = %err, "Artifact store unavailable")
        }
        _ => tracing::warn!(operation, error = %err, "Artifact store request failed"),
    }
}
