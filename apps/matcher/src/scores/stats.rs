//! Read-side summaries over persisted scores for one job offer.

use serde::Serialize;

use crate::models::score::ScoreRow;

/// Counts per stage-3 match level. Labels are matched exactly as emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchLevelDistribution {
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
}

impl MatchLevelDistribution {
    pub fn from_scores(scores: &[ScoreRow]) -> Self {
        let count = |level: &str| scores.iter().filter(|s| s.match_level == level).count();
        Self {
            excellent: count("EXCELLENT"),
            good: count("GOOD"),
            fair: count("FAIR"),
            poor: count("POOR"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobOfferStats {
    pub total_cvs: usize,
    pub avg_final_score: f64,
    pub avg_job_match_score: f64,
    pub avg_organization_score: f64,
    pub max_final_score: f64,
    pub min_final_score: f64,
    pub distribution: MatchLevelDistribution,
}

impl JobOfferStats {
    /// All zeros for an empty score set.
    pub fn from_scores(scores: &[ScoreRow]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let finals = || scores.iter().map(|s| s.final_score);
        Self {
            total_cvs: scores.len(),
            avg_final_score: mean(finals()),
            avg_job_match_score: mean(scores.iter().map(|s| s.job_match_score)),
            avg_organization_score: mean(scores.iter().map(|s| s.organization_score)),
            max_final_score: finals().fold(f64::NEG_INFINITY, f64::max),
            min_final_score: finals().fold(f64::INFINITY, f64::min),
            distribution: MatchLevelDistribution::from_scores(scores),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// 1 + the number of scores for the job with a strictly higher final score.
pub fn rank_by_final_score(scores: &[ScoreRow], user_id: i64) -> Option<usize> {
    let mine = scores.iter().find(|s| s.user_id == user_id)?;
    Some(
        1 + scores
            .iter()
            .filter(|s| s.final_score > mine.final_score)
            .count(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonItem {
    pub user_id: i64,
    pub final_score: f64,
    pub job_match_score: f64,
    pub organization_score: f64,
    pub match_level: String,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub job_offer_id: i64,
    pub items: Vec<ComparisonItem>,
    pub winner: Option<ComparisonItem>,
}

/// Side-by-side view of the requested users' scores. Unscored users are left out.
pub fn compare(job_offer_id: i64, scores: &[ScoreRow], user_ids: &[i64]) -> Comparison {
    let mut items: Vec<ComparisonItem> = user_ids
        .iter()
        .filter_map(|&uid| scores.iter().find(|s| s.user_id == uid))
        .map(|s| ComparisonItem {
            user_id: s.user_id,
            final_score: s.final_score,
            job_match_score: s.job_match_score,
            organization_score: s.organization_score,
            match_level: s.match_level.clone(),
            rank: rank_by_final_score(scores, s.user_id).unwrap_or(0),
        })
        .collect();

    // first strictly-greater wins, so ties go to the earlier requested user
    let winner = items
        .iter()
        .fold(None::<&ComparisonItem>, |best, item| match best {
            Some(b) if b.final_score >= item.final_score => Some(b),
            _ => Some(item),
        })
        .cloned();

    items.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

    Comparison {
        job_offer_id,
        items,
        winner,
    }
}
