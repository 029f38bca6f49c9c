//! Scan subjects

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A cat registered by a user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cat {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cat {
    pub fn new(owner_id: String, name: String) -> Self {
        let now = catscan_common::time::now();
        Self {
            id: catscan_common::uuid_utils::generate(),
            owner_id,
            name,
            created_at: now,
            updated_at: now,
        }
    }
}
