use std::collections::{HashMap, HashSet};

use conductor_types::{Task, TaskPlan, TaskStatus};

use crate::OrchestrationError;

/// The dependency-annotated task set for one session, validated as a DAG.
/// Planning order is preserved; it is the deterministic tie-break when more
/// than one task is ready.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,
}

impl TaskGraph {
    /// Validates planner output before any task executes: ids must be
    /// unique, every dependency must name a known task, and the dependency
    /// relation must be acyclic (Kahn's algorithm).
    pub fn build(plans: Vec<TaskPlan>) -> Result<Self, OrchestrationError> {
        if plans.is_empty() {
            return Err(OrchestrationError::InvalidDependencyGraph(
                "plan contains no tasks".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for plan in &plans {
            if !ids.insert(plan.id.as_str()) {
                return Err(OrchestrationError::InvalidDependencyGraph(format!(
                    "duplicate task id `{}`",
                    plan.id
                )));
            }
        }

        for plan in &plans {
            for dep in &plan.dependencies {
                if !ids.contains(dep.as_str()) {
                    return Err(OrchestrationError::InvalidDependencyGraph(format!(
                        "task `{}` depends on unknown task `{}`",
                        plan.id, dep
                    )));
                }
            }
        }

        // Kahn: repeatedly remove zero-indegree nodes; leftovers form a cycle.
        let mut indegree: HashMap<&str, usize> = plans
            .iter()
            .map(|p| (p.id.as_str(), p.dependencies.len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for plan in &plans {
            for dep in &plan.dependencies {
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(plan.id.as_str());
            }
        }

        let mut queue: Vec<&str> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut visited = 0usize;
        while let Some(id) = queue.pop() {
            visited += 1;
            for &dependent in dependents.get(id).into_iter().flatten() {
                let deg = indegree.get_mut(dependent).expect("known id");
                *deg -= 1;
                if *deg == 0 {
                    queue.push(dependent);
                }
            }
        }

        if visited != plans.len() {
            let stuck: Vec<&str> = indegree
                .iter()
                .filter(|(_, &deg)| deg > 0)
                .map(|(&id, _)| id)
                .collect();
            return Err(OrchestrationError::InvalidDependencyGraph(format!(
                "dependency cycle involving tasks: {}",
                stuck.join(", ")
            )));
        }

        Ok(Self {
            tasks: plans.into_iter().map(Task::from_plan).collect(),
        })
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// First pending task whose dependencies are all completed, in planning
/// order. `None` either means everything is done or nothing can proceed.
pub(crate) fn ready_task_index(tasks: &[Task]) -> Option<usize> {
    let completed: HashSet<&str> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .map(|t| t.id.as_str())
        .collect();
    tasks.iter().position(|task| {
        task.status == TaskStatus::Pending
            && task
                .dependencies
                .iter()
                .all(|dep| completed.contains(dep.as_str()))
    })
}
