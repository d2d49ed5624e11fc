use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::PersistenceError;
use crate::models::cv::ScoreKey;
use crate::models::score::{CombinedResult, ScoreRow};
use crate::scores::gateway::ScoreGateway;

/// `cv_scores` table gateway. The unique (user_id, job_offer_id) constraint
/// makes the upsert a single statement.
#[derive(Clone)]
pub struct PgScoreStore {
    pool: PgPool,
}

impl PgScoreStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoreGateway for PgScoreStore {
    async fn find_score(&self, key: ScoreKey) -> Result<Option<ScoreRow>, PersistenceError> {
        Ok(sqlx::query_as::<_, ScoreRow>(
            "SELECT * FROM cv_scores WHERE user_id = $1 AND job_offer_id = $2",
        )
        .bind(key.user_id)
        .bind(key.job_offer_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_score(
        &self,
        key: ScoreKey,
        cv_path: &str,
        result: &CombinedResult,
    ) -> Result<Uuid, PersistenceError> {
        let (id, inserted): (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO cv_scores
                (id, user_id, job_offer_id, cv_path,
                 organization_score, technical_score, composite_score,
                 experience_score, skills_score, education_score,
                 job_match_score, skills_match_score, experience_match_score,
                 education_match_score, content_relevance_score,
                 match_level, job_title, final_score, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (user_id, job_offer_id) DO UPDATE SET
                organization_score      = EXCLUDED.organization_score,
                technical_score         = EXCLUDED.technical_score,
                composite_score         = EXCLUDED.composite_score,
                experience_score        = EXCLUDED.experience_score,
                skills_score            = EXCLUDED.skills_score,
                education_score         = EXCLUDED.education_score,
                job_match_score         = EXCLUDED.job_match_score,
                skills_match_score      = EXCLUDED.skills_match_score,
                experience_match_score  = EXCLUDED.experience_match_score,
                education_match_score   = EXCLUDED.education_match_score,
                content_relevance_score = EXCLUDED.content_relevance_score,
                match_level             = EXCLUDED.match_level,
                job_title               = EXCLUDED.job_title,
                final_score             = EXCLUDED.final_score,
                processed_at            = EXCLUDED.processed_at,
                updated_at              = NOW()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key.user_id)
        .bind(key.job_offer_id)
        .bind(cv_path)
        .bind(result.organization_score)
        .bind(result.technical_score)
        .bind(result.composite_score)
        .bind(result.experience_score)
        .bind(result.skills_score)
        .bind(result.education_score)
        .bind(result.job_match_score)
        .bind(result.skills_match_score)
        .bind(result.experience_match_score)
        .bind(result.education_match_score)
        .bind(result.content_relevance_score)
        .bind(&result.match_level)
        .bind(&result.job_title)
        .bind(result.final_score)
        .bind(result.processed_at)
        .fetch_one(&self.pool)
        .await?;

        if inserted {
            info!("Created new score {id} for {key}");
        } else {
            info!("Updated existing score {id} for {key}");
        }
        Ok(id)
    }

    async fn scores_for_job(&self, job_offer_id: i64) -> Result<Vec<ScoreRow>, PersistenceError> {
        Ok(sqlx::query_as::<_, ScoreRow>(
            "SELECT * FROM cv_scores WHERE job_offer_id = $1 ORDER BY final_score DESC, user_id ASC",
        )
        .bind(job_offer_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
