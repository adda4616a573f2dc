use crate::types::{Step, WorkflowDef};
use std::collections::{HashMap, HashSet, VecDeque};
use unitbus_core::{ErrorCode, UnitError};
use unitbus_registry::Registry;

/// A validated, ready-to-run execution plan for a [`WorkflowDef`]: step ids
/// in deterministic topological order (ties broken by definition position)
/// plus each step's resolved dependents, so the engine can wake them as
/// their dependencies complete.
pub struct ExecutionPlan {
    pub order: Vec<String>,
    pub steps: HashMap<String, Step>,
    pub dependents: HashMap<String, Vec<String>>,
    pub indegree: HashMap<String, usize>,
}

/// Verifies step-id uniqueness, resolves every step's `type` against the
/// registry, resolves `depends_on` references, and detects cycles via
/// Kahn's algorithm, in that order — matching the failure precedence.
pub async fn build_plan(def: &WorkflowDef, registry: &Registry) -> Result<ExecutionPlan, UnitError> {
    let mut steps = HashMap::new();
    for step in &def.steps {
        if steps.insert(step.id.clone(), step.clone()).is_some() {
            return Err(UnitError::from_code(
                ErrorCode::AlreadyExists,
                format!("step id '{}' is declared more than once", step.id),
            ));
        }
    }

    for step in &def.steps {
        if registry.get(&step.unit_type).await.is_none() {
            return Err(UnitError::from_code(
                ErrorCode::StepNotFound,
                format!("step '{}' names unregistered unit '{}'", step.id, step.unit_type),
            ));
        }
        for dep in &step.depends_on {
            if !steps.contains_key(dep) {
                return Err(UnitError::from_code(
                    ErrorCode::InvalidDependency,
                    format!("step '{}' depends on unknown step '{}'", step.id, dep),
                ));
            }
        }
    }

    let mut indegree: HashMap<String, usize> = HashMap::new();
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for step in &def.steps {
        indegree.entry(step.id.clone()).or_insert(0);
        dependents.entry(step.id.clone()).or_default();
    }
    for step in &def.steps {
        *indegree.get_mut(&step.id).unwrap() = step.depends_on.len();
        for dep in &step.depends_on {
            dependents.get_mut(dep).unwrap().push(step.id.clone());
        }
    }

    let order = topological_order(def, &indegree, &dependents)?;

    Ok(ExecutionPlan {
        order,
        steps,
        dependents,
        indegree,
    })
}

/// Kahn's algorithm. Ties among ready steps are broken by the step's
/// position in `def.steps` so the resulting order is deterministic.
fn topological_order(
    def: &WorkflowDef,
    indegree: &HashMap<String, usize>,
    dependents: &HashMap<String, Vec<String>>,
) -> Result<Vec<String>, UnitError> {
    let position: HashMap<&str, usize> = def
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut remaining = indegree.clone();
    let mut ready: VecDeque<String> = def
        .steps
        .iter()
        .filter(|s| remaining[&s.id] == 0)
        .map(|s| s.id.clone())
        .collect();

    let mut order = Vec::with_capacity(def.steps.len());
    let mut visited = HashSet::new();

    while !ready.is_empty() {
        let mut batch: Vec<String> = ready.drain(..).collect();
        batch.sort_by_key(|id| position[id.as_str()]);

        for id in batch.drain(..) {
            if !visited.insert(id.clone()) {
                continue;
            }
            order.push(id.clone());
            for dep in &dependents[&id] {
                let entry = remaining.get_mut(dep).unwrap();
                *entry -= 1;
                if *entry == 0 {
                    ready.push_back(dep.clone());
                }
            }
        }
    }

    if order.len() != def.steps.len() {
        return Err(UnitError::from_code(
            ErrorCode::CyclicDependencies,
            "workflow step graph contains a cycle",
        ));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OnFailure, Step};
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn step(id: &str, deps: &[&str]) -> Step {
        Step {
            id: id.to_string(),
            unit_type: "echo.noop".to_string(),
            input: Value::Null,
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            on_failure: OnFailure::Fail,
            retry: None,
        }
    }

    fn def(steps: Vec<Step>) -> WorkflowDef {
        WorkflowDef {
            id: "wf".to_string(),
            name: "wf".to_string(),
            description: String::new(),
            config: BTreeMap::new(),
            steps,
            output: Value::Null,
        }
    }

    #[test]
    fn topological_order_respects_dependencies_and_declaration_ties() {
        let d = def(vec![step("c", &["a"]), step("b", &[]), step("a", &[])]);
        let indegree: HashMap<String, usize> =
            [("a".to_string(), 0), ("b".to_string(), 0), ("c".to_string(), 1)].into();
        let dependents: HashMap<String, Vec<String>> = [
            ("a".to_string(), vec!["c".to_string()]),
            ("b".to_string(), vec![]),
            ("c".to_string(), vec![]),
        ]
        .into();

        let order = topological_order(&d, &indegree, &dependents).unwrap();
        // b comes before a by declaration order among zero-indegree steps;
        // c must come after a.
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn a_cycle_is_rejected() {
        let d = def(vec![step("a", &["b"]), step("b", &["a"])]);
        let indegree: HashMap<String, usize> = [("a".to_string(), 1), ("b".to_string(), 1)].into();
        let dependents: HashMap<String, Vec<String>> = [
            ("a".to_string(), vec!["b".to_string()]),
            ("b".to_string(), vec!["a".to_string()]),
        ]
        .into();

        let err = topological_order(&d, &indegree, &dependents).unwrap_err();
        assert_eq!(err.code, "cyclic_dependencies");
    }
}
