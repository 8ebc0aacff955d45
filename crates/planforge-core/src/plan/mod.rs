//! Plan data model, JSON parsing and prompt construction.

pub mod format;
pub mod parser;
pub mod prompt;

pub use format::{AuditResult, Group, PlanRequest, Priority, ProjectPlan, ResponseEnvelope, Task};
pub use parser::{PlanParseError, parse_plan_json};
pub use prompt::{build_audit_prompt, build_fix_up_prompt, build_system_prompt, plan_schema};
