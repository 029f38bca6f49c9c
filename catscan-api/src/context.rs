//! Caller identity
//!
//! Authentication happens upstream of this service; the gateway forwards the
//! authenticated user id in `X-User-Id`. No header means a guest caller.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Who is calling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: Option<String>,
}

impl CallerContext {
    pub fn guest() -> Self {
        Self { user_id: None }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    /// The user id, or 400 `USER_REQUIRED` for guests
    pub fn require_user(&self) -> ApiResult<&str> {
        self.user_id.as_deref().ok_or_else(|| {
            ApiError::bad_request("USER_REQUIRED", "This operation requires a signed-in user")
        })
    }

    /// Sessions a read may cover
    ///
    /// Users see their own sessions; guests see only the ids they pass.
    pub fn read_scope(&self, session_ids: Vec<Uuid>) -> ReadScope {
        match &self.user_id {
            Some(user_id) => ReadScope::Owner(user_id.clone()),
            None => ReadScope::Sessions(session_ids),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        Ok(Self { user_id })
    }
}

/// Set of sessions visible to a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadScope {
    Owner(String),
    Sessions(Vec<Uuid>),
}

/// Parse a comma-separated `session_ids` query value
///
/// Blank entries are skipped; any other unparseable entry is a validation error.
pub fn parse_session_ids(raw: Option<&str>) -> ApiResult<Vec<Uuid>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = Uuid::parse_str(part)
            .map_err(|_| ApiError::Validation(format!("invalid session id: '{}'", part)))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}
