//! Wire types for generated plans and their audit metadata.
//!
//! Plan types mirror the JSON the generation model is constrained to emit
//! (camelCase keys). Every field is required: a missing key fails
//! deserialization rather than falling back to a default.

use serde::{Deserialize, Serialize};

/// Incoming request for a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    /// Free-text project goal.
    pub description: String,
    /// Delivery strategy, interpolated verbatim into the system prompt.
    pub strategy: String,
}

impl PlanRequest {
    pub const DEFAULT_STRATEGY: &str = "Standard";

    pub fn new(description: impl Into<String>, strategy: Option<String>) -> Self {
        Self {
            description: description.into(),
            strategy: strategy.unwrap_or_else(|| Self::DEFAULT_STRATEGY.to_owned()),
        }
    }
}

/// A complete generated plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPlan {
    pub project_name: String,
    /// Phases in delivery order.
    pub groups: Vec<Group>,
}

/// One phase of the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_name: String,
    /// Day the phase begins, relative to project day 0.
    pub phase_start_day: u32,
    pub tasks: Vec<Task>,
}

/// A single task inside a phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_name: String,
    pub description: String,
    pub priority: Priority,
    /// Always greater than zero once parsed.
    pub duration_days: u32,
    /// Days after the phase start at which the task begins.
    pub start_day_offset: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// The auditor's verdict on a plan.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuditResult {
    /// 0 to 100.
    pub confidence_score: u8,
    /// Free text, conventionally "Step 1: ... Step 2: ..." segments.
    pub feedback: String,
    pub specific_issues: Vec<String>,
}

impl AuditResult {
    pub const FALLBACK_FEEDBACK: &str = "Step 1: Auditor unavailable. Step 2: Please review manually.";

    /// Verdict substituted when the auditor fails.
    pub fn fallback(score: u8) -> Self {
        Self {
            confidence_score: score,
            feedback: Self::FALLBACK_FEEDBACK.to_owned(),
            specific_issues: Vec::new(),
        }
    }
}

/// What the HTTP caller receives: the plan with audit fields merged in.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseEnvelope {
    #[serde(flatten)]
    pub plan: ProjectPlan,
    pub audit_score: u8,
    pub audit_feedback: String,
    pub audit_issues: Vec<String>,
}

impl ResponseEnvelope {
    pub fn new(plan: ProjectPlan, audit: AuditResult) -> Self {
        Self {
            plan,
            audit_score: audit.confidence_score,
            audit_feedback: audit.feedback,
            audit_issues: audit.specific_issues,
        }
    }
}
