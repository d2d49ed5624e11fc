// Scheduled scoring pipeline: three external stages per unscored CV record,
// their outputs combined into one final score and upserted through the gateway.

pub mod combine;
pub mod extract;
pub mod orchestrator;
pub mod scheduler;
pub mod stage;
pub mod workspace;

pub use orchestrator::{PassOutcome, PassSummary, Pipeline, PipelineStages};
pub use scheduler::run_scheduler;
