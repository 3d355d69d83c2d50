// Run pipeline: extraction orchestration, processing, and retry helpers

pub mod orchestrator;
pub mod processing;
pub mod retry;

pub use orchestrator::{ExtractorStatus, RunOrchestrator, RunSummary};
