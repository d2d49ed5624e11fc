use chrono::NaiveDateTime;
use tracing::debug;

use crate::models::score::{CombinedResult, JobMatchResult, ScoreResult};

/// Weight of the stage-2 composite score in the final score.
pub const COMPOSITE_WEIGHT: f64 = 0.40;
/// Weight of the stage-3 overall match score in the final score.
pub const JOB_MATCH_WEIGHT: f64 = 0.60;
/// Value substituted for any score a stage did not report.
pub const DEFAULT_SCORE: f64 = 50.0;
pub const UNKNOWN_MATCH_LEVEL: &str = "UNKNOWN";
pub const UNKNOWN_JOB_TITLE: &str = "Unknown Job";

/// Merges the two stage outputs into one record:
/// `final = composite × 0.40 + job_match × 0.60`, missing scores counted as 50.
pub fn combine(
    scores: &ScoreResult,
    job_match: &JobMatchResult,
    processed_at: NaiveDateTime,
) -> CombinedResult {
    let or_default = |v: Option<f64>| v.unwrap_or(DEFAULT_SCORE);

    let composite_score = or_default(scores.composite_score);
    let job_match_score = or_default(job_match.overall_match_score);
    let final_score = composite_score * COMPOSITE_WEIGHT + job_match_score * JOB_MATCH_WEIGHT;

    debug!("Combined results: composite={composite_score}, jobMatch={job_match_score}, final={final_score}");

    CombinedResult {
        organization_score: or_default(scores.organization_score),
        technical_score: or_default(scores.technical_score),
        composite_score,
        experience_score: or_default(scores.experience_score),
        skills_score: or_default(scores.skills_score),
        education_score: or_default(scores.education_score),
        job_match_score,
        skills_match_score: or_default(job_match.skills_match_score),
        experience_match_score: or_default(job_match.experience_match_score),
        education_match_score: or_default(job_match.education_match_score),
        content_relevance_score: or_default(job_match.content_relevance_score),
        match_level: job_match
            .match_level
            .clone()
            .unwrap_or_else(|| UNKNOWN_MATCH_LEVEL.to_string()),
        job_title: job_match
            .job_title
            .clone()
            .unwrap_or_else(|| UNKNOWN_JOB_TITLE.to_string()),
        final_score,
        processed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> NaiveDateTime {
        NaiveDateTime::default()
    }

    #[test]
    fn test_final_score_weights() {
        let combined = combine(
            &ScoreResult {
                composite_score: Some(80.0),
                ..Default::default()
            },
            &JobMatchResult {
                overall_match_score: Some(90.0),
                ..Default::default()
            },
            at(),
        );
        // 80 × 0.40 + 90 × 0.60 = 32 + 54
        assert!((combined.final_score - 86.0).abs() < 1e-9, "{}", combined.final_score);
    }

    #[test]
    fn test_all_absent_defaults_to_fifty() {
        let combined = combine(&ScoreResult::default(), &JobMatchResult::default(), at());
        assert!((combined.final_score - 50.0).abs() < 1e-9);
        assert_eq!(combined.match_level, "UNKNOWN");
        assert_eq!(combined.job_title, "Unknown Job");
        assert_eq!(combined.organization_score, 50.0);
        assert_eq!(combined.content_relevance_score, 50.0);
    }

    #[test]
    fn test_present_fields_pass_through() {
        let combined = combine(
            &ScoreResult {
                organization_score: Some(71.5),
                skills_score: Some(12.0),
                ..Default::default()
            },
            &JobMatchResult {
                skills_match_score: Some(66.0),
                match_level: Some("GOOD".to_string()),
                job_title: Some("Data Engineer".to_string()),
                ..Default::default()
            },
            at(),
        );
        assert_eq!(combined.organization_score, 71.5);
        assert_eq!(combined.skills_score, 12.0);
        assert_eq!(combined.skills_match_score, 66.0);
        assert_eq!(combined.match_level, "GOOD");
        assert_eq!(combined.job_title, "Data Engineer");
        assert_eq!(combined.technical_score, DEFAULT_SCORE);
    }

    #[test]
    fn test_combine_is_pure() {
        let s = ScoreResult {
            composite_score: Some(33.3),
            ..Default::default()
        };
        let j = JobMatchResult::default();
        assert_eq!(combine(&s, &j, at()), combine(&s, &j, at()));
    }
}
