//! Health labels and derived scores
//!
//! One healthy-label set is used by every read path (dashboard, history,
//! PDF data). Labels compare trimmed and case-insensitively.

use serde::Serialize;

/// Detail labels that count as healthy
pub const HEALTHY_LABELS: [&str; 3] = ["healthy", "sehat", "normal"];

pub fn is_healthy_label(label: &str) -> bool {
    let label = label.trim();
    HEALTHY_LABELS.iter().any(|h| h.eq_ignore_ascii_case(label))
}

/// Normal vs abnormal detail counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelCounts {
    pub normal: usize,
    pub abnormal: usize,
}

impl LabelCounts {
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts = Self::default();
        for label in labels {
            if is_healthy_label(label) {
                counts.normal += 1;
            } else {
                counts.abnormal += 1;
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.normal + self.abnormal
    }

    /// A session counts as healthy with at least one healthy detail
    pub fn is_healthy(&self) -> bool {
        self.normal > 0
    }

    /// Any non-healthy detail flags the session
    pub fn is_abnormal(&self) -> bool {
        self.abnormal > 0
    }

    /// normal / total × 100, 0 when there are no details
    pub fn normal_percentage(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        let pct = self.normal as f64 * 100.0 / self.total() as f64;
        (pct * 100.0).round() / 100.0
    }
}

/// round(100·H/N); 100 when there are no sessions
pub fn health_score(healthy_sessions: usize, total_sessions: usize) -> u32 {
    if total_sessions == 0 {
        return 100;
    }
    (healthy_sessions as f64 * 100.0 / total_sessions as f64).round() as u32
}
