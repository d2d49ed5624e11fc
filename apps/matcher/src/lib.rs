pub mod config;
pub mod corpus;
pub mod db;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod ranking;
pub mod scores;
