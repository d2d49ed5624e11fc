pub mod cv;
pub mod ranking;
pub mod score;

pub use cv::{CvRecord, ScoreKey};
pub use ranking::CvRanking;
pub use score::{CombinedResult, JobMatchResult, ScoreResult, ScoreRow};
