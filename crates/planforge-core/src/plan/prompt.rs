//! Prompt construction for plan generation, regeneration and audit.
//!
//! Pure string assembly: nothing here performs I/O or can fail. The
//! strategy is interpolated verbatim; adjectives such as "Fast" or "Safe"
//! only steer the model.

use serde_json::{Value, json};

use super::format::AuditResult;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Role, scheduling rules and output contract for the generation model.
const SCHEDULING_GUIDELINES: &str = r#"You are an expert Project Manager. Create a realistic execution plan based on the user's description and strategy.

SCHEDULING LOGIC (Dynamic):
1. **Analyze Dependencies:**
   - If Task B requires Task A to finish (e.g., "Build Roof" after "Build Walls"), Task B must start *after* Task A.
   - If Task B is independent of Task A (e.g., "Order Windows" vs "Hire Plumber"), they should run **IN PARALLEL** (start at the same time).

2. **Apply Strategy:**
   - If Strategy is **"Fast"**, **"Aggressive"**, or **"Short-term"**: Use maximum parallelism and overlapping (intercalated) tasks.
   - If Strategy is **"Safe"**, **"Step-by-step"**, **"Sequential"**, or **"Quality"**: Prefer sequential tasks to minimize risk.

3. **Calculate Offsets:**
   - 'phaseStartDay': When the Group begins relative to Project Day 0.
   - 'startDayOffset': When the Task begins relative to the Group start.
     - Parallel Task: Offset 0 (or close to it).
     - Sequential Task: Offset = Sum of previous tasks' duration.
     - Intercalated Task: Offset = Previous Task Start + (Previous Task Duration / 2).
"#;

/// Build the system prompt for the generation model.
pub fn build_system_prompt(strategy: &str) -> String {
    let mut prompt = String::with_capacity(SCHEDULING_GUIDELINES.len() + 128);
    prompt.push_str(SCHEDULING_GUIDELINES);
    prompt.push('\n');
    prompt.push_str(&format!("USER'S STRATEGY: \"{strategy}\"\n\n"));
    prompt.push_str("Respond ONLY with the JSON object defined in the schema.");
    prompt
}

/// Response schema handed to the generation endpoint.
///
/// Only the remote model reads this; locally the same shape is enforced by
/// the serde types in [`super::format`].
pub fn plan_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "projectName": {"type": "STRING"},
            "groups": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "groupName": {"type": "STRING"},
                        "phaseStartDay": {
                            "type": "INTEGER",
                            "description": "Day number when this Phase begins relative to Project Day 0."
                        },
                        "tasks": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "taskName": {"type": "STRING"},
                                    "description": {"type": "STRING"},
                                    "priority": {"type": "STRING", "enum": ["High", "Medium", "Low"]},
                                    "durationDays": {"type": "INTEGER"},
                                    "startDayOffset": {
                                        "type": "INTEGER",
                                        "description": "Days after the PHASE start that this task begins. 0 means starts immediately."
                                    }
                                },
                                "required": ["taskName", "description", "priority", "durationDays", "startDayOffset"]
                            }
                        }
                    },
                    "required": ["groupName", "phaseStartDay", "tasks"]
                }
            }
        },
        "required": ["projectName", "groups"]
    })
}

/// Build the user query for a regeneration round.
///
/// Carries the rejected plan's score, each issue the auditor raised, and the
/// original goal so the model can fix the plan without seeing it again.
pub fn build_fix_up_prompt(description: &str, audit: &AuditResult) -> String {
    let mut prompt = String::with_capacity(description.len() + 512);
    prompt.push_str(&format!(
        "A reviewer rated the previous plan for this goal {}/100, which is below the acceptance bar.\n\n",
        audit.confidence_score
    ));
    if audit.specific_issues.is_empty() {
        prompt.push_str("The reviewer did not list specific issues. Re-check dependencies, durations and offsets.\n");
    } else {
        prompt.push_str("Issues to fix:\n");
        for issue in &audit.specific_issues {
            prompt.push_str(&format!("- {issue}\n"));
        }
    }
    prompt.push_str(&format!(
        "\nOriginal goal: {description}\n\nProduce a corrected plan that resolves every issue above."
    ));
    prompt
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// System message for the audit model.
pub const AUDITOR_SYSTEM_PROMPT: &str = "You are a meticulous senior project auditor. \
     You review project plans for missing work, broken dependencies, unrealistic \
     durations and schedules that contradict the requested strategy. \
     You answer with a single JSON object and nothing else.";

/// Build the critique request for a serialized plan.
pub fn build_audit_prompt(plan_json: &str, strategy: &str) -> String {
    let mut prompt = String::with_capacity(plan_json.len() + 1024);
    prompt.push_str("Audit the following project plan.\n\n");
    prompt.push_str(&format!("STRATEGY: \"{strategy}\"\n\n"));
    prompt.push_str("PLAN:\n");
    prompt.push_str(plan_json);
    prompt.push_str("\n\n");
    prompt.push_str(
        "Check that:\n\
         1. Every phase and task needed to reach the goal is present.\n\
         2. Tasks that depend on each other do not overlap, and independent tasks are not needlessly serialized.\n\
         3. phaseStartDay and startDayOffset values are consistent with task durations.\n\
         4. The degree of parallelism matches the strategy.\n\n",
    );
    prompt.push_str(
        "Respond with JSON only, using exactly these fields:\n\
         {\"confidence_score\": <integer 0-100>, \
         \"feedback\": \"Step 1: ... Step 2: ...\", \
         \"specific_issues\": [\"...\"]}\n",
    );
    prompt
}
