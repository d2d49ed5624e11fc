// On-demand ranking: preprocessing → TF-IDF → cosine similarity.
// Synchronous and read-only; callers on the async runtime go through spawn_blocking.

pub mod preprocess;
pub mod ranker;
pub mod tfidf;

pub use ranker::{CvRanker, BEST_TOP_N, MAX_TOP_N};
