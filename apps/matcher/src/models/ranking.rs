use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::cv::CvRecord;

/// A candidate's position in one ranking call. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CvRanking {
    pub cv: CvRecord,
    /// Cosine similarity against the job description, 0.0 – 1.0
    pub similarity_score: f64,
    /// 1-based, assigned after sorting and truncation
    pub rank: usize,
    pub ranked_at: NaiveDateTime,
}
