//! Pipeline orchestrator.
//!
//! One pass: list every CV record, keep the latest row per (user, job offer),
//! drop the ones that already have a persisted score, then push each remaining record through the three external stages
//! one at a time. A record that fails is logged and counted; the pass always
//! runs to the end and always logs its summary.
//!
//! Per-record lifecycle:
//!
//! ```text
//! DISCOVERED → NORMALIZING → SCORING_ORG → MATCHING_JOB → COMBINING → PERSISTED
//!      └────────────┴─────────────┴─────────────┴─────────────┴──→ FAILED
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::corpus::csv::encode_single;
use crate::corpus::RecordStore;
use crate::errors::PipelineError;
use crate::models::cv::CvRecord;
use crate::models::score::JobMatchResult;
use crate::pipeline::combine::combine;
use crate::pipeline::extract::{parse_job_match_result, parse_score_result};
use crate::pipeline::stage::{StageRunner, StageSpec};
use crate::pipeline::workspace::StageWorkspace;
use crate::scores::ScoreGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Discovered,
    Normalizing,
    ScoringOrg,
    MatchingJob,
    Combining,
    Persisted,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Discovered => "DISCOVERED",
            JobState::Normalizing => "NORMALIZING",
            JobState::ScoringOrg => "SCORING_ORG",
            JobState::MatchingJob => "MATCHING_JOB",
            JobState::Combining => "COMBINING",
            JobState::Persisted => "PERSISTED",
            JobState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// The three stages in execution order.
#[derive(Debug, Clone)]
pub struct PipelineStages {
    pub normalize: StageSpec,
    pub org_score: StageSpec,
    pub job_match: StageSpec,
}

#[derive(Debug)]
pub enum RecordOutcome {
    Persisted { id: Uuid, final_score: f64 },
    /// A score appeared between discovery and the write; nothing was written.
    AlreadyScored,
    /// `state` is the state the record was in when it failed.
    Failed { state: JobState, error: PipelineError },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassSummary {
    pub discovered: usize,
    pub pending: usize,
    pub persisted: usize,
    pub already_scored: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed(PassSummary),
    /// Another pass held the run lock.
    Skipped,
}

pub struct Pipeline {
    records: Arc<dyn RecordStore>,
    scores: Arc<dyn ScoreGateway>,
    runner: StageRunner,
    stages: PipelineStages,
    temp_dir: PathBuf,
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        records: Arc<dyn RecordStore>,
        scores: Arc<dyn ScoreGateway>,
        runner: StageRunner,
        stages: PipelineStages,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            records,
            scores,
            runner,
            stages,
            temp_dir: temp_dir.into(),
            run_lock: Mutex::new(()),
        }
    }

    /// Runs one full pass, or returns `Skipped` at once if a pass is already
    /// in flight.
    pub async fn run_pass(&self) -> PassOutcome {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("Pipeline pass already in progress, skipping");
            return PassOutcome::Skipped;
        };

        info!("Starting pipeline pass");
        let records = self.load_records().await;
        let mut summary = PassSummary {
            discovered: records.len(),
            ..Default::default()
        };

        let mut pending = Vec::new();
        for record in latest_per_key(records) {
            let key = record.key();
            match self.scores.find_score(key).await {
                Ok(Some(_)) => debug!("Already scored: {key}"),
                Ok(None) => pending.push(record),
                Err(e) => {
                    error!("Idempotency check failed for {key}: {e}");
                    summary.failed += 1;
                }
            }
        }
        summary.pending = pending.len();
        info!("Found {} unscored CV records", pending.len());

        for record in &pending {
            match self.process_record(record).await {
                RecordOutcome::Persisted { .. } => summary.persisted += 1,
                RecordOutcome::AlreadyScored => summary.already_scored += 1,
                RecordOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        info!(
            "Pipeline pass finished: discovered={}, pending={}, persisted={}, already_scored={}, failed={}",
            summary.discovered,
            summary.pending,
            summary.persisted,
            summary.already_scored,
            summary.failed
        );
        PassOutcome::Completed(summary)
    }

    /// Takes one record through every stage. Never panics or propagates:
    /// failures come back as `RecordOutcome::Failed`.
    pub async fn process_record(&self, record: &CvRecord) -> RecordOutcome {
        let key = record.key();
        let mut state = JobState::Discovered;
        info!("Processing CV record {key} ({})", record.cv_path);

        match self.drive(record, &mut state).await {
            Ok(outcome) => outcome,
            Err(error) => {
                error!("Record {key} failed during {state}: {error}");
                debug!("{key}: {state} -> {}", JobState::Failed);
                RecordOutcome::Failed { state, error }
            }
        }
    }

    async fn drive(
        &self,
        record: &CvRecord,
        state: &mut JobState,
    ) -> Result<RecordOutcome, PipelineError> {
        let key = record.key();
        let mut advance = |next: JobState| {
            debug!("{key}: {} -> {next}", *state);
            *state = next;
        };

        // Dropped on every return path below, which removes all scratch files.
        let ws = StageWorkspace::create(&self.temp_dir, key).map_err(PipelineError::Workspace)?;
        tokio::fs::write(ws.input(), encode_single(record))
            .await
            .map_err(PipelineError::Workspace)?;

        advance(JobState::Normalizing);
        self.runner
            .run(&self.stages.normalize, &ws.input(), &ws.normalized())
            .await?;

        advance(JobState::ScoringOrg);
        self.runner
            .run(&self.stages.org_score, &ws.normalized(), &ws.org_scores())
            .await?;
        let org_output = tokio::fs::read_to_string(ws.org_scores())
            .await
            .map_err(|source| PipelineError::MissingOutput {
                stage: self.stages.org_score.name,
                path: ws.org_scores(),
                source,
            })?;
        let scores = parse_score_result(&org_output);

        advance(JobState::MatchingJob);
        self.runner
            .run(&self.stages.job_match, &ws.normalized(), &ws.job_match())
            .await?;
        let job_match = match tokio::fs::read_to_string(ws.job_match()).await {
            Ok(content) => parse_job_match_result(&content),
            Err(e) => {
                warn!("No job match output for {key} ({e}), using default match scores");
                JobMatchResult::default()
            }
        };

        advance(JobState::Combining);
        let combined = combine(&scores, &job_match, Local::now().naive_local());

        if self.scores.find_score(key).await?.is_some() {
            info!("{key} was scored while in flight, not overwriting");
            return Ok(RecordOutcome::AlreadyScored);
        }
        let id = self
            .scores
            .upsert_score(key, &record.cv_path, &combined)
            .await?;

        advance(JobState::Persisted);
        info!(
            "Persisted score {id} for {key}: final={:.2} ({})",
            combined.final_score, combined.match_level
        );
        Ok(RecordOutcome::Persisted {
            id,
            final_score: combined.final_score,
        })
    }

    /// A store that cannot be read counts as empty for this pass.
    async fn load_records(&self) -> Vec<CvRecord> {
        let store = Arc::clone(&self.records);
        match tokio::task::spawn_blocking(move || store.list_records()).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!("CV record store unavailable, nothing to process: {e}");
                Vec::new()
            }
            Err(e) => {
                error!("CV record loading task failed: {e}");
                Vec::new()
            }
        }
    }
}

/// Keeps one record per (user, job offer): the last one in store order, which
/// is the latest upload. Survivors stay in store order.
fn latest_per_key(records: Vec<CvRecord>) -> Vec<CvRecord> {
    let mut seen = HashSet::new();
    let mut latest: Vec<CvRecord> = records
        .into_iter()
        .rev()
        .filter(|record| {
            let fresh = seen.insert(record.key());
            if !fresh {
                debug!("Superseded row for {} ({})", record.key(), record.cv_path);
            }
            fresh
        })
        .collect();
    latest.reverse();
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::errors::StoreError;
    use crate::scores::MemoryScoreStore;

    struct NoStore;

    impl RecordStore for NoStore {
        fn list_records(&self) -> Result<Vec<CvRecord>, StoreError> {
            Err(StoreError::Io {
                path: PathBuf::from("missing.csv"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    fn stages() -> PipelineStages {
        let spec = |name| StageSpec::new(name, "unused.py", Duration::from_secs(1));
        PipelineStages {
            normalize: spec("normalize"),
            org_score: spec("org_score"),
            job_match: spec("job_match"),
        }
    }

    fn pipeline() -> Pipeline {
        let tmp = std::env::temp_dir();
        Pipeline::new(
            Arc::new(NoStore),
            Arc::new(MemoryScoreStore::new()),
            StageRunner::new("sh", &tmp),
            stages(),
            tmp,
        )
    }

    #[test]
    fn test_job_state_labels() {
        assert_eq!(JobState::ScoringOrg.to_string(), "SCORING_ORG");
        assert_eq!(JobState::MatchingJob.to_string(), "MATCHING_JOB");
    }

    #[tokio::test]
    async fn test_unreadable_store_is_an_empty_pass() {
        let outcome = pipeline().run_pass().await;
        assert_eq!(outcome, PassOutcome::Completed(PassSummary::default()));
    }

    #[tokio::test]
    async fn test_overlapping_pass_is_skipped() {
        let pipeline = pipeline();
        let _held = pipeline.run_lock.lock().await;
        assert_eq!(pipeline.run_pass().await, PassOutcome::Skipped);
    }

    #[test]
    fn test_pass_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(PassOutcome::Completed(PassSummary {
            discovered: 2,
            pending: 1,
            persisted: 1,
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["persisted"], 1);
        assert_eq!(serde_json::to_value(PassOutcome::Skipped).unwrap()["status"], "skipped");
    }
}
