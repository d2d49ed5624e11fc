use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Stage-2 (organisation scorer) output. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub organization_score: Option<f64>,
    pub technical_score: Option<f64>,
    pub composite_score: Option<f64>,
    pub experience_score: Option<f64>,
    pub skills_score: Option<f64>,
    pub education_score: Option<f64>,
}

/// Stage-3 (job matcher) output. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMatchResult {
    pub overall_match_score: Option<f64>,
    pub skills_match_score: Option<f64>,
    pub experience_match_score: Option<f64>,
    pub education_match_score: Option<f64>,
    pub content_relevance_score: Option<f64>,
    pub match_level: Option<String>,
    pub job_title: Option<String>,
}

/// Both stage outputs with defaults applied, plus the final weighted score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedResult {
    pub organization_score: f64,
    pub technical_score: f64,
    pub composite_score: f64,
    pub experience_score: f64,
    pub skills_score: f64,
    pub education_score: f64,
    pub job_match_score: f64,
    pub skills_match_score: f64,
    pub experience_match_score: f64,
    pub education_match_score: f64,
    pub content_relevance_score: f64,
    pub match_level: String,
    pub job_title: String,
    pub final_score: f64,
    pub processed_at: NaiveDateTime,
}

/// A persisted score row (`cv_scores`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScoreRow {
    pub id: Uuid,
    pub user_id: i64,
    pub job_offer_id: i64,
    pub cv_path: Option<String>,
    pub organization_score: f64,
    pub technical_score: f64,
    pub composite_score: f64,
    pub experience_score: f64,
    pub skills_score: f64,
    pub education_score: f64,
    pub job_match_score: f64,
    pub skills_match_score: f64,
    pub experience_match_score: f64,
    pub education_match_score: f64,
    pub content_relevance_score: f64,
    pub match_level: String,
    pub job_title: String,
    pub final_score: f64,
    pub processed_at: NaiveDateTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScoreRow {
    /// Builds a fresh row for `result`, as an in-memory store would insert it.
    pub fn new(
        user_id: i64,
        job_offer_id: i64,
        cv_path: Option<String>,
        result: &CombinedResult,
    ) -> Self {
        let now = Utc::now();
        let mut row = ScoreRow {
            id: Uuid::new_v4(),
            user_id,
            job_offer_id,
            cv_path,
            organization_score: 0.0,
            technical_score: 0.0,
            composite_score: 0.0,
            experience_score: 0.0,
            skills_score: 0.0,
            education_score: 0.0,
            job_match_score: 0.0,
            skills_match_score: 0.0,
            experience_match_score: 0.0,
            education_match_score: 0.0,
            content_relevance_score: 0.0,
            match_level: String::new(),
            job_title: String::new(),
            final_score: 0.0,
            processed_at: result.processed_at,
            created_at: now,
            updated_at: now,
        };
        row.apply(result);
        row
    }

    /// Overwrites every score column with `result` (the update half of an upsert).
    pub fn apply(&mut self, result: &CombinedResult) {
        self.organization_score = result.organization_score;
        self.technical_score = result.technical_score;
        self.composite_score = result.composite_score;
        self.experience_score = result.experience_score;
        self.skills_score = result.skills_score;
        self.education_score = result.education_score;
        self.job_match_score = result.job_match_score;
        self.skills_match_score = result.skills_match_score;
        self.experience_match_score = result.experience_match_score;
        self.education_match_score = result.education_match_score;
        self.content_relevance_score = result.content_relevance_score;
        self.match_level = result.match_level.clone();
        self.job_title = result.job_title.clone();
        self.final_score = result.final_score;
        self.processed_at = result.processed_at;
        self.updated_at = Utc::now();
    }
}
