//! Job execution: analysis process, translation stage, orchestrator, and
//! the bounded worker pool that runs them.
//!
//! Outside callers go through [`JobService`]; the stage collaborators are
//! traits ([`AnalysisRunner`], [`TranslationBackend`]) so they can be faked.

pub mod analysis;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod extract;
pub mod joblog;
pub mod orchestrator;
pub mod pool;
pub mod service;
pub mod translation;

pub use analysis::{AnalysisRunner, YomitokuRunner};
pub use config::PipelineConfig;
pub use error::{PipelineError, PoolError, SubmitError};
pub use orchestrator::JobRunner;
pub use pool::WorkerPool;
pub use service::JobService;
pub use translation::TranslationBackend;
