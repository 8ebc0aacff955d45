//! Clients for the two upstream language models.
//!
//! The pipeline only sees the [`PlanGenerator`] and [`PlanAuditor`] traits;
//! [`GeminiClient`] and [`ChatAuditClient`] are the production
//! implementations.
//!
//! ```text
//! PlanPipeline
//!     |
//!     +-- PlanGenerator::generate(query, system_prompt, schema) --> ProjectPlan | PlanError
//!     |        (GeminiClient: retries per RetryPolicy)
//!     |
//!     +-- PlanAuditor::audit(plan, strategy) --> AuditResult
//!              (ChatAuditClient: never fails, falls back to a fixed verdict)
//! ```

pub mod audit;
pub mod gemini;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PlanError;
use crate::plan::{AuditResult, ProjectPlan};

pub use audit::{ChatAuditClient, extract_json_object, parse_verdict};
pub use gemini::GeminiClient;

/// Produces a plan from a user query and system prompt.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Generate and parse a plan.
    ///
    /// Transport and response-shape failures are retried by the
    /// implementation; a parse failure of the returned text is not.
    async fn generate(
        &self,
        query: &str,
        system_prompt: &str,
        schema: &Value,
    ) -> Result<ProjectPlan, PlanError>;
}

/// Scores a plan against the requested strategy.
#[async_trait]
pub trait PlanAuditor: Send + Sync {
    fn name(&self) -> &str;

    /// Critique the plan. Infallible: implementations substitute a fallback
    /// verdict for any internal failure.
    async fn audit(&self, plan: &ProjectPlan, strategy: &str) -> AuditResult;
}

// Both traits are stored as `Arc<dyn _>` by the pipeline.
const _: () = {
    fn _assert_object_safe(_: &dyn PlanGenerator, _: &dyn PlanAuditor) {}
};
