//! Plan JSON parser with validation.
//!
//! Parses the text returned by the generation model into a [`ProjectPlan`]
//! and checks what the type system cannot:
//! - Every task has a positive `durationDays`.

use thiserror::Error;

use super::format::ProjectPlan;
use crate::error::PlanError;

/// Errors that can occur while parsing a generated plan.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task {task:?} in group {group:?} has durationDays 0 (must be positive)")]
    ZeroDuration { group: String, task: String },
}

impl From<PlanParseError> for PlanError {
    fn from(err: PlanParseError) -> Self {
        PlanError::Parse(err.to_string())
    }
}

/// Parse and validate a plan JSON string.
pub fn parse_plan_json(content: &str) -> Result<ProjectPlan, PlanParseError> {
    let plan: ProjectPlan = serde_json::from_str(content)?;
    validate(&plan)?;
    Ok(plan)
}

fn validate(plan: &ProjectPlan) -> Result<(), PlanParseError> {
    for group in &plan.groups {
        if let Some(task) = group.tasks.iter().find(|t| t.duration_days == 0) {
            return Err(PlanParseError::ZeroDuration {
                group: group.group_name.clone(),
                task: task.task_name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::format::Priority;

    const VALID: &str = r#"
    {
      "projectName": "Test Project",
      "groups": [
        {
          "groupName": "Phase 1",
          "phaseStartDay": 0,
          "tasks": [
            {
              "taskName": "Task A",
              "description": "Desc A",
              "priority": "High",
              "durationDays": 2,
              "startDayOffset": 0
            },
            {
              "taskName": "Task B",
              "description": "Desc B",
              "priority": "Low",
              "durationDays": 3,
              "startDayOffset": 1
            }
          ]
        }
      ]
    }"#;

    #[test]
    fn parse_valid_plan() {
        let plan = parse_plan_json(VALID).expect("should parse");
        assert_eq!(plan.project_name, "Test Project");
        assert_eq!(plan.groups.len(), 1);
        let tasks = &plan.groups[0].tasks;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].priority, Priority::High);
        assert_eq!(tasks[1].start_day_offset, 1);
    }

    #[test]
    fn accepts_plan_without_groups() {
        let plan = parse_plan_json(r#"{"projectName": "Test Project", "groups": []}"#)
            .expect("empty groups are allowed");
        assert!(plan.groups.is_empty());
    }

    #[test]
    fn rejects_missing_project_name() {
        let err = parse_plan_json(r#"{"groups": []}"#).unwrap_err();
        assert!(
            matches!(err, PlanParseError::Json(_)),
            "expected Json, got: {err}"
        );
        assert!(err.to_string().contains("projectName"), "{err}");
    }

    #[test]
    fn rejects_missing_phase_start_day() {
        let err = parse_plan_json(
            r#"{"projectName": "P", "groups": [{"groupName": "G", "tasks": []}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("phaseStartDay"), "{err}");
    }

    #[test]
    fn rejects_missing_start_day_offset() {
        let err = parse_plan_json(
            r#"{"projectName": "P", "groups": [{"groupName": "G", "phaseStartDay": 0,
                "tasks": [{"taskName": "T", "description": "D", "priority": "High",
                "durationDays": 1}]}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("startDayOffset"), "{err}");
    }

    #[test]
    fn rejects_unknown_priority() {
        let err = parse_plan_json(
            r#"{"projectName": "P", "groups": [{"groupName": "G", "phaseStartDay": 0,
                "tasks": [{"taskName": "T", "description": "D", "priority": "Urgent",
                "durationDays": 1, "startDayOffset": 0}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlanParseError::Json(_)), "got: {err}");
    }

    #[test]
    fn rejects_negative_offset() {
        let err = parse_plan_json(
            r#"{"projectName": "P", "groups": [{"groupName": "G", "phaseStartDay": -1,
                "tasks": []}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlanParseError::Json(_)), "got: {err}");
    }

    #[test]
    fn rejects_zero_duration() {
        let err = parse_plan_json(
            r#"{"projectName": "P", "groups": [{"groupName": "G", "phaseStartDay": 0,
                "tasks": [{"taskName": "T", "description": "D", "priority": "Medium",
                "durationDays": 0, "startDayOffset": 0}]}]}"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, PlanParseError::ZeroDuration { ref task, .. } if task == "T"),
            "expected ZeroDuration, got: {err}"
        );
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_plan_json("Not JSON").unwrap_err();
        assert!(matches!(err, PlanParseError::Json(_)));
        let plan_err: PlanError = err.into();
        assert_eq!(plan_err.kind(), crate::error::ErrorKind::Parse);
    }
}
