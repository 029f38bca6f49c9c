//! User-filed complaints about a session's quality or accuracy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// Report category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportCategory {
    PhotoQuality,
    InaccurateResult,
    WrongIdentity,
    Other,
}

impl ReportCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportCategory::PhotoQuality => "photo-quality",
            ReportCategory::InaccurateResult => "inaccurate-result",
            ReportCategory::WrongIdentity => "wrong-identity",
            ReportCategory::Other => "other",
        }
    }
}

impl fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo-quality" => Ok(ReportCategory::PhotoQuality),
            "inaccurate-result" => Ok(ReportCategory::InaccurateResult),
            "wrong-identity" => Ok(ReportCategory::WrongIdentity),
            "other" => Ok(ReportCategory::Other),
            other => Err(UnknownVariant::new("report category", other)),
        }
    }
}

/// Review status; transitions belong to the admin side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Resolved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "reviewed" => Ok(ReportStatus::Reviewed),
            "resolved" => Ok(ReportStatus::Resolved),
            "rejected" => Ok(ReportStatus::Rejected),
            other => Err(UnknownVariant::new("report status", other)),
        }
    }
}

/// Complaint about a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckupReport {
    pub id: Uuid,
    pub session_id: Uuid,
    pub reporter_id: Option<String>,
    pub category: ReportCategory,
    /// Short tags, unique, in submission order
    pub reasons: Vec<String>,
    pub description: Option<String>,
    pub contact: Option<String>,
    pub status: ReportStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckupReport {
    pub fn new(
        session_id: Uuid,
        reporter_id: Option<String>,
        category: ReportCategory,
        reasons: Vec<String>,
        description: Option<String>,
        contact: Option<String>,
    ) -> Self {
        let now = catscan_common::time::now();
        Self {
            id: catscan_common::uuid_utils::generate(),
            session_id,
            reporter_id,
            category,
            reasons: normalize_reasons(reasons),
            description,
            contact,
            status: ReportStatus::Pending,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Trim, drop blanks and duplicates, keep first-seen order
pub fn normalize_reasons(reasons: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(reasons.len());
    for reason in reasons {
        let reason = reason.trim().to_string();
        if !reason.is_empty() && !out.contains(&reason) {
            out.push(reason);
        }
    }
    out
}
