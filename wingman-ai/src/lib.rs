//! # Wingman analysis and generation
//!
//! Orchestration on top of the `wingman-common` store:
//! - [`inference`]: the external inference boundary, with auditing and an HTTP client
//! - [`media`]: frame extraction from profile media
//! - [`pipeline`]: progressive profile analysis with cancellation and
//!   independently settling scoring branches
//! - [`cache`]: per-profile generated compatibility artifacts and
//!   once-per-session auto-generation

pub mod cache;
pub mod error;
pub mod inference;
pub mod media;
pub mod pipeline;
pub mod prompts;

pub use cache::{ArtifactKind, AutoGenerator, CacheState, GeneratedArtifactCache};
pub use error::{CacheError, CacheErrorCategory, InferenceError, PipelineError};
pub use inference::{InferenceRequest, InferenceResponse, InferenceService, InferenceTask};
pub use media::{Frame, MediaExtractor};
pub use pipeline::{AnalysisEvent, AnalysisPipeline, AnalysisRun, RunState};
