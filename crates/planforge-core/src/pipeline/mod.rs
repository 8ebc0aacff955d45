//! Generate, audit, and at most once regenerate.
//!
//! ```text
//! Generating -> Auditing -> Done                        (score >= threshold)
//!                        -> Regenerating -> ReAuditing -> Done   (any score)
//! Generating   -> Failed
//! Regenerating -> Failed
//! ```
//!
//! A request makes 2 to 4 upstream calls. The number of audit passes is a
//! hard bound, not a setting, so a non-deterministic model can never keep
//! the loop alive.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::PlanError;
use crate::llm::{ChatAuditClient, GeminiClient, PlanAuditor, PlanGenerator};
use crate::plan::{
    PlanRequest, ProjectPlan, ResponseEnvelope, build_fix_up_prompt, build_system_prompt,
    plan_schema,
};

/// States of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Generating,
    Auditing,
    Regenerating,
    ReAuditing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_valid_transition(from: Self, to: Self) -> bool {
        use PipelineState::*;
        matches!(
            (from, to),
            (Generating, Auditing)
                | (Generating, Failed)
                | (Auditing, Done)
                | (Auditing, Regenerating)
                | (Regenerating, ReAuditing)
                | (Regenerating, Failed)
                | (ReAuditing, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Generating => "generating",
            Self::Auditing => "auditing",
            Self::Regenerating => "regenerating",
            Self::ReAuditing => "re-auditing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A successful run: the envelope plus how it was reached.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub envelope: ResponseEnvelope,
    /// Every state entered, in order, ending with `Done`.
    pub trace: Vec<PipelineState>,
    pub generation_calls: u32,
    pub audit_calls: u32,
}

#[derive(Debug, Default)]
struct RunTrace {
    states: Vec<PipelineState>,
    generation_calls: u32,
    audit_calls: u32,
}

impl RunTrace {
    fn enter(&mut self, next: PipelineState) {
        if let Some(&current) = self.states.last() {
            debug_assert!(
                PipelineState::is_valid_transition(current, next),
                "invalid pipeline transition {current} -> {next}"
            );
        }
        debug!(state = %next, "pipeline: entering state");
        self.states.push(next);
    }
}

/// Orchestrates one generation model and one audit model.
pub struct PlanPipeline {
    generator: Arc<dyn PlanGenerator>,
    auditor: Arc<dyn PlanAuditor>,
    pass_threshold: u8,
    request_deadline: Option<Duration>,
}

impl PlanPipeline {
    /// Audit passes per request, including the re-audit.
    pub const MAX_AUDIT_PASSES: u32 = 2;

    pub fn new(
        generator: Arc<dyn PlanGenerator>,
        auditor: Arc<dyn PlanAuditor>,
        pass_threshold: u8,
    ) -> Self {
        Self {
            generator,
            auditor,
            pass_threshold,
            request_deadline: None,
        }
    }

    /// Bound the whole run. `None` lets it take as long as the upstream
    /// calls do.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.request_deadline = deadline;
        self
    }

    /// Build the production pipeline from resolved configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, PlanError> {
        let generator = GeminiClient::new(&config.generation, &config.retry)?;
        let auditor = ChatAuditClient::new(&config.audit)?;
        Ok(
            Self::new(Arc::new(generator), Arc::new(auditor), config.audit.pass_threshold)
                .with_deadline(config.request_deadline),
        )
    }

    pub fn pass_threshold(&self) -> u8 {
        self.pass_threshold
    }

    /// Run one request to completion.
    pub async fn run(&self, request: &PlanRequest) -> Result<PlanOutcome, PlanError> {
        if request.description.trim().is_empty() {
            return Err(PlanError::Validation("description is required".to_owned()));
        }

        match self.request_deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run_inner(request))
                .await
                .map_err(|_| {
                    warn!(?deadline, "pipeline: request deadline exceeded");
                    PlanError::DeadlineExceeded(deadline)
                })?,
            None => self.run_inner(request).await,
        }
    }

    async fn run_inner(&self, request: &PlanRequest) -> Result<PlanOutcome, PlanError> {
        let system_prompt = build_system_prompt(&request.strategy);
        let schema = plan_schema();
        let mut run = RunTrace::default();

        run.enter(PipelineState::Generating);
        let mut plan = self
            .generate(&mut run, &request.description, &system_prompt, &schema)
            .await?;

        let mut passes = 0;
        loop {
            run.enter(if passes == 0 {
                PipelineState::Auditing
            } else {
                PipelineState::ReAuditing
            });
            run.audit_calls += 1;
            let audit = self.auditor.audit(&plan, &request.strategy).await;
            passes += 1;

            let passed = audit.confidence_score >= self.pass_threshold;
            if passed || passes >= Self::MAX_AUDIT_PASSES {
                if passed {
                    info!(score = audit.confidence_score, passes, "pipeline: plan accepted");
                } else {
                    warn!(
                        score = audit.confidence_score,
                        threshold = self.pass_threshold,
                        "pipeline: accepting plan below threshold after regeneration"
                    );
                }
                run.enter(PipelineState::Done);
                return Ok(PlanOutcome {
                    envelope: ResponseEnvelope::new(plan, audit),
                    trace: run.states,
                    generation_calls: run.generation_calls,
                    audit_calls: run.audit_calls,
                });
            }

            info!(
                score = audit.confidence_score,
                threshold = self.pass_threshold,
                issues = audit.specific_issues.len(),
                "pipeline: audit below threshold, regenerating"
            );
            run.enter(PipelineState::Regenerating);
            let fix_up = build_fix_up_prompt(&request.description, &audit);
            plan = self
                .generate(&mut run, &fix_up, &system_prompt, &schema)
                .await?;
        }
    }

    async fn generate(
        &self,
        run: &mut RunTrace,
        query: &str,
        system_prompt: &str,
        schema: &Value,
    ) -> Result<ProjectPlan, PlanError> {
        run.generation_calls += 1;
        match self.generator.generate(query, system_prompt, schema).await {
            Ok(plan) => Ok(plan),
            Err(e) => {
                warn!(
                    generator = self.generator.name(),
                    error = %e,
                    "pipeline: generation failed"
                );
                run.enter(PipelineState::Failed);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineState::*;
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(PipelineState::is_valid_transition(Generating, Auditing));
        assert!(PipelineState::is_valid_transition(Auditing, Regenerating));
        assert!(PipelineState::is_valid_transition(Regenerating, ReAuditing));
        assert!(PipelineState::is_valid_transition(ReAuditing, Done));
        assert!(PipelineState::is_valid_transition(Regenerating, Failed));
    }

    #[test]
    fn no_second_regeneration() {
        assert!(!PipelineState::is_valid_transition(ReAuditing, Regenerating));
        assert!(!PipelineState::is_valid_transition(ReAuditing, Failed));
        assert!(!PipelineState::is_valid_transition(Done, Generating));
        assert!(!PipelineState::is_valid_transition(Auditing, Failed));
    }

    #[test]
    fn terminal_states() {
        assert!(Done.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!ReAuditing.is_terminal());
    }

    #[test]
    fn display() {
        assert_eq!(ReAuditing.to_string(), "re-auditing");
        assert_eq!(Generating.to_string(), "generating");
    }
}
