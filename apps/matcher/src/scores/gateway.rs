//! Score gateway: where combined pipeline scores live.
//!
//! The pipeline only needs two things from storage: "is this (user, job)
//! already scored?" and "write this score, replacing any previous one".
//! `PgScoreStore` is the production backend; `MemoryScoreStore` backs tests
//! and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::errors::PersistenceError;
use crate::models::cv::ScoreKey;
use crate::models::score::{CombinedResult, ScoreRow};

#[async_trait]
pub trait ScoreGateway: Send + Sync {
    /// The persisted score for `key`, if any. Its existence is the pipeline's
    /// "already scored" marker.
    async fn find_score(&self, key: ScoreKey) -> Result<Option<ScoreRow>, PersistenceError>;

    /// Inserts or replaces the score for `key`, returning the row id.
    async fn upsert_score(
        &self,
        key: ScoreKey,
        cv_path: &str,
        result: &CombinedResult,
    ) -> Result<Uuid, PersistenceError>;

    /// Every persisted score for one job offer, best final score first.
    async fn scores_for_job(&self, job_offer_id: i64) -> Result<Vec<ScoreRow>, PersistenceError>;
}

/// Process-local gateway. Upserts are keyed by (user, job offer) exactly like
/// the database's unique constraint.
#[derive(Default)]
pub struct MemoryScoreStore {
    rows: RwLock<HashMap<ScoreKey, ScoreRow>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl ScoreGateway for MemoryScoreStore {
    async fn find_score(&self, key: ScoreKey) -> Result<Option<ScoreRow>, PersistenceError> {
        Ok(self.rows.read().await.get(&key).cloned())
    }

    async fn upsert_score(
        &self,
        key: ScoreKey,
        cv_path: &str,
        result: &CombinedResult,
    ) -> Result<Uuid, PersistenceError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&key) {
            Some(existing) => {
                info!("Updating existing score for {key}");
                existing.apply(result);
                Ok(existing.id)
            }
            None => {
                info!("Creating new score for {key}");
                let row = ScoreRow::new(
                    key.user_id,
                    key.job_offer_id,
                    Some(cv_path.to_string()),
                    result,
                );
                let id = row.id;
                rows.insert(key, row);
                Ok(id)
            }
        }
    }

    async fn scores_for_job(&self, job_offer_id: i64) -> Result<Vec<ScoreRow>, PersistenceError> {
        let mut scores: Vec<ScoreRow> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| r.job_offer_id == job_offer_id)
            .cloned()
            .collect();
        scores.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then(a.user_id.cmp(&b.user_id))
        });
        Ok(scores)
    }
}
