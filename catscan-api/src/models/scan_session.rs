//! Scan session state machine
//!
//! A session starts in `processing` and moves once to a terminal state,
//! `done` or `failed`. Terminal states never change again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Processing,
    Done,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Processing => "processing",
            SessionStatus::Done => "done",
            SessionStatus::Failed => "failed",
        }
    }

    /// Decide what moving from `self` to `next` means
    pub fn transition_to(&self, next: SessionStatus) -> StatusChange {
        match (self, next) {
            (current, next) if *current == next => StatusChange::Unchanged,
            (SessionStatus::Processing, next) => StatusChange::Applied {
                from: SessionStatus::Processing,
                to: next,
            },
            (current, next) => StatusChange::Rejected {
                from: *current,
                to: next,
            },
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(SessionStatus::Processing),
            "done" => Ok(SessionStatus::Done),
            "failed" => Ok(SessionStatus::Failed),
            other => Err(UnknownVariant::new("session status", other)),
        }
    }
}

/// Outcome of a requested status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Applied {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// Requested status equals the current one
    Unchanged,
    /// Terminal state would change, or processing would be re-entered
    Rejected {
        from: SessionStatus,
        to: SessionStatus,
    },
}

/// Checkup depth requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckupType {
    Quick,
    Detail,
}

impl CheckupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckupType::Quick => "quick",
            CheckupType::Detail => "detail",
        }
    }
}

impl fmt::Display for CheckupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckupType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quick" => Ok(CheckupType::Quick),
            "detail" => Ok(CheckupType::Detail),
            other => Err(UnknownVariant::new("checkup type", other)),
        }
    }
}

/// Where the photo was taken
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub place: Option<String>,
}

impl Geolocation {
    /// Check coordinate ranges; both or neither coordinate must be present
    pub fn validate(&self) -> Result<(), String> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(format!("latitude out of range: {}", lat));
                }
                if !(-180.0..=180.0).contains(&lon) {
                    return Err(format!("longitude out of range: {}", lon));
                }
                Ok(())
            }
            (None, None) => Ok(()),
            _ => Err("latitude and longitude must be provided together".to_string()),
        }
    }
}

/// One user-initiated examination attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSession {
    pub id: Uuid,
    /// None for guest sessions not yet claimed
    pub owner_id: Option<String>,
    pub cat_id: Option<Uuid>,
    pub scan_type: String,
    pub checkup_type: CheckupType,
    pub status: SessionStatus,
    pub geolocation: Geolocation,
    pub informer: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields supplied when a session is created
#[derive(Debug, Clone)]
pub struct NewScanSession {
    pub owner_id: Option<String>,
    pub cat_id: Option<Uuid>,
    pub scan_type: String,
    pub checkup_type: CheckupType,
    pub geolocation: Geolocation,
    pub informer: Option<String>,
    pub notes: Option<String>,
}

impl ScanSession {
    /// Create a session; status is always `processing`
    pub fn new(fields: NewScanSession) -> Self {
        let now = catscan_common::time::now();
        Self {
            id: catscan_common::uuid_utils::generate(),
            owner_id: fields.owner_id,
            cat_id: fields.cat_id,
            scan_type: fields.scan_type,
            checkup_type: fields.checkup_type,
            status: SessionStatus::Processing,
            geolocation: fields.geolocation,
            informer: fields.informer,
            notes: fields.notes,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
