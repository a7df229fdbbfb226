//! Execution plans: an optional DAG of delegated steps.
//!
//! The store persists plans wholesale ([`TaskStore::save_execution_plan`])
//! without structural checks; [`validate_plan`] is the planner-side guard
//! that every dependency references a step of the same plan and that the
//! dependency relation is acyclic.
//!
//! [`TaskStore::save_execution_plan`]: super::TaskStore::save_execution_plan

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlanError;

use super::TaskStatus;

/// Lifecycle of a whole plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Planning,
    Executing,
    Completed,
    Failed,
}

/// One delegated step inside a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    /// Specialist the step is assigned to.
    pub agent_id: String,
    pub task: String,
    /// Ids of steps within the same plan that must complete first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A session's execution plan, unique per `(sessionId, planId)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub session_id: String,
    pub plan_id: String,
    pub description: String,
    pub steps: Vec<PlanStep>,
    pub status: PlanStatus,
}

/// Check that every dependency references another step of the same plan
/// and that the dependency relation forms a DAG.
pub fn validate_plan(steps: &[PlanStep]) -> Result<(), PlanError> {
    let by_id: HashMap<&str, &PlanStep> =
        steps.iter().map(|step| (step.id.as_str(), step)).collect();

    for step in steps {
        for dependency in &step.dependencies {
            if !by_id.contains_key(dependency.as_str()) {
                return Err(PlanError::UnknownDependency {
                    step: step.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a PlanStep>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<(), PlanError> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(PlanError::Cycle { step: id.to_string() });
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        for dependency in &by_id[id].dependencies {
            visit(dependency, by_id, marks)?;
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    for step in steps {
        visit(&step.id, &by_id, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, dependencies: &[&str]) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            description: format!("step {id}"),
            agent_id: "researcher".to_string(),
            task: "do the thing".to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    #[test]
    fn test_valid_dag_passes() {
        let steps = vec![
            step("gather", &[]),
            step("analyze", &["gather"]),
            step("report", &["gather", "analyze"]),
        ];
        assert!(validate_plan(&steps).is_ok());
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let steps = vec![step("a", &["missing"])];
        let err = validate_plan(&steps).unwrap_err();
        assert!(matches!(
            err,
            PlanError::UnknownDependency { ref step, ref dependency }
                if step == "a" && dependency == "missing"
        ));
    }

    #[test]
    fn test_direct_cycle_is_rejected() {
        let steps = vec![step("a", &["b"]), step("b", &["a"])];
        assert!(matches!(
            validate_plan(&steps),
            Err(PlanError::Cycle { .. })
        ));
    }

    #[test]
    fn test_self_cycle_is_rejected() {
        let steps = vec![step("a", &["a"])];
        assert!(matches!(
            validate_plan(&steps),
            Err(PlanError::Cycle { .. })
        ));
    }

    #[test]
    fn test_longer_cycle_is_rejected() {
        let steps = vec![step("a", &["c"]), step("b", &["a"]), step("c", &["b"])];
        assert!(matches!(
            validate_plan(&steps),
            Err(PlanError::Cycle { .. })
        ));
    }

    #[test]
    fn test_empty_plan_is_valid() {
        assert!(validate_plan(&[]).is_ok());
    }
}
