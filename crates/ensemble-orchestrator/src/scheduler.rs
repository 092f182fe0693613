//! Dependency scheduler: orders one round's subtasks so every task runs after
//! the task it depends on.
//!
//! Declarations are validated before ordering. A round is rejected when it
//! contains a non-positive or duplicate id, a self-dependency, a dependency on
//! an id that is neither in the round nor among earlier rounds' results, or a
//! cycle. A dependency on an earlier round adds no ordering edge, since that
//! result already exists.

use crate::types::{Subtask, TaskResult};
use ensemble_core::{EnsembleError, EnsembleResult};
use std::collections::{HashMap, HashSet, VecDeque};

/// Execution order (task ids) for a round's subtasks.
///
/// Kahn's algorithm over a forest where every task has at most one parent:
/// ready tasks are seeded in arrival order, and the dependents released by a
/// finished task are enqueued in ascending id order, so the result is
/// deterministic for a given input.
pub fn execution_order(subtasks: &[Subtask], prior: &[TaskResult]) -> EnsembleResult<Vec<u32>> {
    let mut ids = HashSet::with_capacity(subtasks.len());
    for task in subtasks {
        if task.task_id == 0 {
            return Err(EnsembleError::Dependency(
                "task_id must be a positive integer, got 0".to_string(),
            ));
        }
        if !ids.insert(task.task_id) {
            return Err(EnsembleError::Dependency(format!(
                "duplicate task_id {} in one round",
                task.task_id
            )));
        }
    }

    let prior_ids: HashSet<u32> = prior.iter().map(TaskResult::task_id).collect();
    let mut dependents: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut unresolved: HashMap<u32, usize> = subtasks.iter().map(|t| (t.task_id, 0)).collect();

    for task in subtasks {
        let Some(dep) = task.depends_on else {
            continue;
        };
        if dep == task.task_id {
            return Err(EnsembleError::Dependency(format!(
                "task {} depends on itself",
                task.task_id
            )));
        }
        if ids.contains(&dep) {
            dependents.entry(dep).or_default().push(task.task_id);
            unresolved.insert(task.task_id, 1);
        } else if !prior_ids.contains(&dep) {
            return Err(EnsembleError::Dependency(format!(
                "task {} depends on unknown task {dep}",
                task.task_id
            )));
        }
    }

    let mut queue: VecDeque<u32> = subtasks
        .iter()
        .map(|t| t.task_id)
        .filter(|id| unresolved.get(id) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(subtasks.len());

    while let Some(id) = queue.pop_front() {
        order.push(id);
        if let Some(children) = dependents.get_mut(&id) {
            children.sort_unstable();
            for child in &*children {
                if let Some(count) = unresolved.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(*child);
                    }
                }
            }
        }
    }

    if order.len() < subtasks.len() {
        let placed: HashSet<u32> = order.iter().copied().collect();
        let stuck: Vec<u32> = subtasks
            .iter()
            .map(|t| t.task_id)
            .filter(|id| !placed.contains(id))
            .collect();
        return Err(EnsembleError::Dependency(format!(
            "dependency cycle among tasks {stuck:?}"
        )));
    }

    Ok(order)
}
