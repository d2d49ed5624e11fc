use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info};

use crate::corpus::RecordStore;
use crate::errors::{EmptyCorpus, RankingError};
use crate::models::cv::CvRecord;
use crate::models::ranking::CvRanking;
use crate::ranking::preprocess::Document;
use crate::ranking::tfidf::TermVectors;

/// Upper bound accepted for `top_n`.
pub const MAX_TOP_N: usize = 20;
/// Size of the shortlist returned by `best`.
pub const BEST_TOP_N: usize = 5;

/// On-demand TF-IDF ranker over the CVs submitted for a job offer.
///
/// Every call reloads the corpus and rebuilds its vectors; nothing is shared
/// between calls, so concurrent rankings for different offers are independent.
#[derive(Clone)]
pub struct CvRanker {
    records: Arc<dyn RecordStore>,
}

impl CvRanker {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// The `top_n` CVs most similar to `job_description`, best first.
    pub fn rank(
        &self,
        job_offer_id: i64,
        job_description: &str,
        top_n: usize,
    ) -> Result<Vec<CvRanking>, RankingError> {
        if top_n == 0 || top_n > MAX_TOP_N {
            return Err(RankingError::InvalidTopN {
                requested: top_n,
                max: MAX_TOP_N,
            });
        }
        let cvs = self.load_corpus(job_offer_id, job_description)?;
        let rankings = rank_cvs(job_description, cvs, top_n);
        info!(
            "Ranked {} CVs for job offer {job_offer_id} (top {top_n})",
            rankings.len()
        );
        Ok(rankings)
    }

    /// `rank` with the shortlist size fixed at 5.
    pub fn best(
        &self,
        job_offer_id: i64,
        job_description: &str,
    ) -> Result<Vec<CvRanking>, RankingError> {
        self.rank(job_offer_id, job_description, BEST_TOP_N)
    }

    /// The single best candidate across the whole corpus, with rank 1.
    /// `None` when nobody applied to the offer; a blank description is
    /// still an error.
    pub fn top_match(
        &self,
        job_offer_id: i64,
        job_description: &str,
    ) -> Result<Option<CvRanking>, RankingError> {
        let cvs = match self.load_corpus(job_offer_id, job_description) {
            Ok(cvs) => cvs,
            Err(RankingError::CorpusEmpty {
                reason: EmptyCorpus::NoRecords,
                ..
            }) => {
                info!("No CVs for job offer {job_offer_id}, no top match");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let all = cvs.len();
        Ok(rank_cvs(job_description, cvs, all).into_iter().next())
    }

    fn load_corpus(
        &self,
        job_offer_id: i64,
        job_description: &str,
    ) -> Result<Vec<CvRecord>, RankingError> {
        if job_description.trim().is_empty() {
            return Err(RankingError::CorpusEmpty {
                job_offer_id,
                reason: EmptyCorpus::MissingDescription,
            });
        }
        let cvs = self.records.records_for_job(job_offer_id)?;
        if cvs.is_empty() {
            return Err(RankingError::CorpusEmpty {
                job_offer_id,
                reason: EmptyCorpus::NoRecords,
            });
        }
        Ok(cvs)
    }
}

/// Scores `cvs` against `job_description` and keeps the best `top_n`.
///
/// Sorting is stable: equal similarities keep corpus order.
pub fn rank_cvs(job_description: &str, cvs: Vec<CvRecord>, top_n: usize) -> Vec<CvRanking> {
    let mut documents = Vec::with_capacity(cvs.len() + 1);
    documents.push(Document::from_text(job_description));
    documents.extend(cvs.iter().map(Document::from_cv));

    let vectors = TermVectors::build(&documents);
    debug!(
        "Built TF-IDF vectors: {} documents, {} terms",
        vectors.document_count(),
        vectors.vocabulary_size()
    );

    let ranked_at = Local::now().naive_local();
    let mut rankings: Vec<CvRanking> = cvs
        .into_iter()
        .enumerate()
        .map(|(i, cv)| CvRanking {
            similarity_score: vectors.cosine(0, i + 1),
            cv,
            rank: 0,
            ranked_at,
        })
        .collect();

    rankings.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    rankings.truncate(top_n);
    for (position, ranking) in rankings.iter_mut().enumerate() {
        ranking.rank = position + 1;
    }
    rankings
}
