//! Read-side composition of sessions, images, results and details
//!
//! Everything here is a read; no operation mutates state.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use super::health_score::{health_score, LabelCounts};
use crate::context::{CallerContext, ReadScope};
use crate::db::{cats, images, results, sessions};
use crate::error::{ApiError, ApiResult};
use crate::models::{CheckupType, ScanImage, ScanResult, ScanResultDetail, ScanSession, SessionStatus};

pub const DEFAULT_HISTORY_DAYS: u32 = 30;
pub const MAX_HISTORY_DAYS: u32 = 365;
pub const RECENT_SESSIONS_LIMIT: usize = 10;

/// A session with everything it owns
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: ScanSession,
    pub images: Vec<ScanImage>,
    pub result: Option<ResultView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    #[serde(flatten)]
    pub result: ScanResult,
    pub details: Vec<ScanResultDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_cats: u64,
    pub total_sessions: usize,
    pub healthy_sessions: usize,
    /// round(100·healthy/total), 100 with no sessions
    pub health_score: u32,
    pub recent_sessions: Vec<RecentSession>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentSession {
    pub id: Uuid,
    pub cat_id: Option<Uuid>,
    pub scan_type: String,
    pub checkup_type: CheckupType,
    pub status: SessionStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub abnormal: bool,
    pub normal_count: usize,
    pub abnormal_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatHistory {
    pub cat_id: Uuid,
    pub days: u32,
    pub points: Vec<HistoryPoint>,
}

/// One UTC day of a cat's history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub sessions: usize,
    pub normal: usize,
    pub total: usize,
    /// normal / total × 100, 0 without details
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfData {
    #[serde(flatten)]
    pub view: SessionView,
    pub summary: PdfSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PdfSummary {
    pub abnormal: bool,
    pub normal_count: usize,
    pub abnormal_count: usize,
    pub total_details: usize,
    pub normal_percentage: f64,
}

/// Read-side report builder
#[derive(Clone)]
pub struct ReportAggregator {
    db: SqlitePool,
}

impl ReportAggregator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Live session with images, result and details
    pub async fn session_view(&self, session_id: Uuid) -> ApiResult<SessionView> {
        let session = sessions::find_session(&self.db, session_id)
            .await?
            .ok_or_else(|| ApiError::not_found("SESSION_NOT_FOUND", "Scan session not found"))?;

        let images = images::list_images_for_session(&self.db, session_id).await?;
        let result = match results::find_result_for_session(&self.db, session_id, false).await? {
            Some(result) => {
                let details = results::list_details(&self.db, result.id).await?;
                Some(ResultView { result, details })
            }
            None => None,
        };

        Ok(SessionView {
            session,
            images,
            result,
        })
    }

    /// Session view plus a health summary for report rendering
    pub async fn pdf_data(&self, session_id: Uuid) -> ApiResult<PdfData> {
        let view = self.session_view(session_id).await?;
        let counts = view
            .result
            .as_ref()
            .map(|r| LabelCounts::from_labels(r.details.iter().map(|d| d.label.as_str())))
            .unwrap_or_default();

        Ok(PdfData {
            view,
            summary: PdfSummary {
                abnormal: counts.is_abnormal(),
                normal_count: counts.normal,
                abnormal_count: counts.abnormal,
                total_details: counts.total(),
                normal_percentage: counts.normal_percentage(),
            },
        })
    }

    /// Totals and health score for a caller's scope
    pub async fn dashboard(&self, scope: &ReadScope) -> ApiResult<DashboardSummary> {
        let scoped = match scope {
            ReadScope::Owner(owner) => sessions::list_sessions_for_owner(&self.db, owner).await?,
            // Guests may only see sessions nobody has claimed
            ReadScope::Sessions(ids) => sessions::list_sessions_by_ids(&self.db, ids)
                .await?
                .into_iter()
                .filter(|s| s.owner_id.is_none())
                .collect(),
        };

        let total_cats = match scope {
            ReadScope::Owner(owner) => cats::count_cats_for_owner(&self.db, owner).await?.max(0) as u64,
            ReadScope::Sessions(_) => scoped
                .iter()
                .filter_map(|s| s.cat_id)
                .collect::<HashSet<_>>()
                .len() as u64,
        };

        let counts = self.label_counts(&scoped).await?;
        let healthy_sessions = scoped
            .iter()
            .filter(|s| counts.get(&s.id).is_some_and(LabelCounts::is_healthy))
            .count();

        let recent_sessions = scoped
            .iter()
            .take(RECENT_SESSIONS_LIMIT)
            .map(|s| {
                let c = counts.get(&s.id).copied().unwrap_or_default();
                RecentSession {
                    id: s.id,
                    cat_id: s.cat_id,
                    scan_type: s.scan_type.clone(),
                    checkup_type: s.checkup_type,
                    status: s.status,
                    created_at: s.created_at,
                    abnormal: c.is_abnormal(),
                    normal_count: c.normal,
                    abnormal_count: c.abnormal,
                }
            })
            .collect();

        Ok(DashboardSummary {
            total_cats,
            total_sessions: scoped.len(),
            healthy_sessions,
            health_score: health_score(healthy_sessions, scoped.len()),
            recent_sessions,
        })
    }

    /// Daily health points of one cat over a trailing window
    pub async fn cat_history(&self, ctx: &CallerContext, cat_id: Uuid, days: Option<u32>) -> ApiResult<CatHistory> {
        let owner = ctx.require_user()?;
        let days = days.unwrap_or(DEFAULT_HISTORY_DAYS);
        if days == 0 || days > MAX_HISTORY_DAYS {
            return Err(ApiError::Validation(format!(
                "days must be between 1 and {}",
                MAX_HISTORY_DAYS
            )));
        }

        if cats::find_cat_for_owner(&self.db, cat_id, owner).await?.is_none() {
            return Err(ApiError::not_found("CAT_NOT_FOUND", "Cat not found"));
        }

        let since = catscan_common::time::now() - Duration::days(i64::from(days));
        let window = sessions::list_sessions_for_cat_since(&self.db, cat_id, since).await?;
        let counts = self.label_counts(&window).await?;

        Ok(CatHistory {
            cat_id,
            days,
            points: history_points(&window, &counts),
        })
    }

    /// Normal/abnormal detail counts per session
    async fn label_counts(&self, scoped: &[ScanSession]) -> ApiResult<HashMap<Uuid, LabelCounts>> {
        let ids: Vec<Uuid> = scoped.iter().map(|s| s.id).collect();
        let labels = results::labels_for_sessions(&self.db, &ids).await?;

        let mut grouped: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (session_id, label) in labels {
            grouped.entry(session_id).or_default().push(label);
        }

        Ok(grouped
            .into_iter()
            .map(|(id, labels)| (id, LabelCounts::from_labels(labels.iter().map(String::as_str))))
            .collect())
    }
}

/// Group sessions by UTC day, oldest day first
pub fn history_points(window: &[ScanSession], counts: &HashMap<Uuid, LabelCounts>) -> Vec<HistoryPoint> {
    let mut days: BTreeMap<NaiveDate, (usize, LabelCounts)> = BTreeMap::new();
    for session in window {
        let entry = days
            .entry(catscan_common::time::utc_day(&session.created_at))
            .or_default();
        entry.0 += 1;
        if let Some(c) = counts.get(&session.id) {
            entry.1.normal += c.normal;
            entry.1.abnormal += c.abnormal;
        }
    }

    days.into_iter()
        .map(|(date, (sessions, c))| HistoryPoint {
            date,
            sessions,
            normal: c.normal,
            total: c.total(),
            score: c.normal_percentage(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Geolocation, NewScanSession};
    use chrono::TimeZone;

    fn session_at(day: u32, hour: u32) -> ScanSession {
        let mut s = ScanSession::new(NewScanSession {
            owner_id: Some("u1".into()),
            cat_id: None,
            scan_type: "eyes".into(),
            checkup_type: CheckupType::Quick,
            geolocation: Geolocation::default(),
            informer: None,
            notes: None,
        });
        s.created_at = chrono::Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap();
        s
    }

    #[test]
    fn test_history_groups_by_utc_day() {
        let a = session_at(1, 8);
        let b = session_at(1, 23);
        let c = session_at(3, 12);

        let mut counts = HashMap::new();
        counts.insert(a.id, LabelCounts { normal: 2, abnormal: 1 });
        counts.insert(b.id, LabelCounts { normal: 1, abnormal: 0 });

        let points = history_points(&[a, b, c], &counts);
        assert_eq!(points.len(), 2);

        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(points[0].sessions, 2);
        assert_eq!(points[0].normal, 3);
        assert_eq!(points[0].total, 4);
        assert_eq!(points[0].score, 75.0);

        assert_eq!(points[1].sessions, 1);
        assert_eq!(points[1].total, 0);
        assert_eq!(points[1].score, 0.0);
    }
}
