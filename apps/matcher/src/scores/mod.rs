// Persisted pipeline scores: the gateway contract, its backends, and read-side stats.

pub mod gateway;
pub mod postgres;
pub mod stats;

pub use gateway::{MemoryScoreStore, ScoreGateway};
pub use postgres::PgScoreStore;
