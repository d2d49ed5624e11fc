use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One extracted CV as it sits in the flat record store.
///
/// Produced upstream by the extraction service; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvRecord {
    pub user_id: i64,
    pub job_offer_id: i64,
    pub cv_path: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub description: String,
    pub skills: String,
    pub experience: String,
    pub education: String,
    pub extracted_at: NaiveDateTime,
}

impl CvRecord {
    pub fn key(&self) -> ScoreKey {
        ScoreKey {
            user_id: self.user_id,
            job_offer_id: self.job_offer_id,
        }
    }
}

/// Identity of a persisted score: one per (user, job offer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScoreKey {
    pub user_id: i64,
    pub job_offer_id: i64,
}

impl std::fmt::Display for ScoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user={}, job={}", self.user_id, self.job_offer_id)
    }
}
