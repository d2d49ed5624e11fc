use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::pipeline::stage::{
    StageSpec, JOB_MATCH_TIMEOUT, NORMALIZE_TIMEOUT, ORG_SCORE_TIMEOUT,
};
use crate::pipeline::PipelineStages;

/// Connection flags handed to the job-matching stage for its own lookups.
#[derive(Debug, Clone)]
pub struct JobMatchDb {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Only the commands that touch persisted scores need it.
    pub database_url: Option<String>,
    pub cv_records_file: PathBuf,
    pub stage_executable: PathBuf,
    pub normalize_script: PathBuf,
    pub org_score_script: PathBuf,
    pub job_match_script: PathBuf,
    pub stage_working_dir: PathBuf,
    pub stage_temp_dir: PathBuf,
    pub job_match_db: JobMatchDb,
    pub pipeline_interval: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: std::env::var("DATABASE_URL").ok(),
            cv_records_file: env_or("CV_RECORDS_FILE", "cv_extracted_info.csv").into(),
            stage_executable: env_or("STAGE_EXECUTABLE", "python").into(),
            normalize_script: env_or("STAGE_NORMALIZE_SCRIPT", "python/cv_processor_spring.py").into(),
            org_score_script: env_or(
                "STAGE_ORG_SCORE_SCRIPT",
                "python/cv_organization_scorer_spring.py",
            )
            .into(),
            job_match_script: env_or("STAGE_JOB_MATCH_SCRIPT", "python/cv_job_matcher_spring.py").into(),
            stage_working_dir: env_or("STAGE_WORKING_DIR", ".").into(),
            stage_temp_dir: std::env::var("STAGE_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            job_match_db: JobMatchDb {
                host: env_or("JOB_MATCH_DB_HOST", "localhost"),
                port: env_or("JOB_MATCH_DB_PORT", "5432")
                    .parse::<u16>()
                    .context("JOB_MATCH_DB_PORT must be a valid port number")?,
                name: env_or("JOB_MATCH_DB_NAME", "cv_filter"),
                user: env_or("JOB_MATCH_DB_USER", "postgres"),
                password: env_or("JOB_MATCH_DB_PASSWORD", ""),
            },
            pipeline_interval: Duration::from_secs(
                env_or("PIPELINE_INTERVAL_SECS", "60")
                    .parse::<u64>()
                    .context("PIPELINE_INTERVAL_SECS must be a whole number of seconds")?,
            ),
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("Required environment variable 'DATABASE_URL' is not set")
    }

    /// The three stages with their fixed timeouts and the job matcher's
    /// connection flags.
    pub fn stages(&self) -> PipelineStages {
        let db = &self.job_match_db;
        PipelineStages {
            normalize: StageSpec::new("normalize", &self.normalize_script, NORMALIZE_TIMEOUT),
            org_score: StageSpec::new("org_score", &self.org_score_script, ORG_SCORE_TIMEOUT),
            job_match: StageSpec::new("job_match", &self.job_match_script, JOB_MATCH_TIMEOUT)
                .with_args([
                    "--db-host".to_string(),
                    db.host.clone(),
                    "--db-port".to_string(),
                    db.port.to_string(),
                    "--db-name".to_string(),
                    db.name.clone(),
                    "--db-user".to_string(),
                    db.user.clone(),
                    "--db-password".to_string(),
                    db.password.clone(),
                ]),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: None,
            cv_records_file: "cv.csv".into(),
            stage_executable: "python".into(),
            normalize_script: "a.py".into(),
            org_score_script: "b.py".into(),
            job_match_script: "c.py".into(),
            stage_working_dir: ".".into(),
            stage_temp_dir: "/tmp".into(),
            job_match_db: JobMatchDb {
                host: "db".to_string(),
                port: 5433,
                name: "cv_filter".to_string(),
                user: "scorer".to_string(),
                password: "secret".to_string(),
            },
            pipeline_interval: Duration::from_secs(60),
            rust_log: "info".to_string(),
        }
    }

    #[test]
    fn test_stages_carry_fixed_timeouts_and_db_flags() {
        let stages = config().stages();
        assert_eq!(stages.normalize.timeout, Duration::from_secs(120));
        assert_eq!(stages.org_score.timeout, Duration::from_secs(120));
        assert_eq!(stages.job_match.timeout, Duration::from_secs(180));
        assert!(stages.normalize.extra_args.is_empty());
        assert_eq!(
            stages.job_match.extra_args,
            vec![
                "--db-host", "db", "--db-port", "5433", "--db-name", "cv_filter", "--db-user",
                "scorer", "--db-password", "secret"
            ]
        );
    }

    #[test]
    fn test_missing_database_url_is_an_error() {
        let err = config().require_database_url().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
