//! Core of planforge: turns a project description and a delivery strategy
//! into a structured, audited project plan.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod plan;

pub use config::{AuditConfig, Backoff, GenerationConfig, RetryPolicy, ServiceConfig};
pub use error::{ErrorKind, PlanError};
pub use pipeline::{PipelineState, PlanOutcome, PlanPipeline};
