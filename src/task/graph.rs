//! Dependency graph queries over task documents.
//!
//! Edges point from a task to the tasks it depends on. The graph is read
//! from disk lazily through a lookup closure so only the reachable part of a
//! large team is loaded.

use super::model::{Task, TaskStatus};
use crate::error::Result;
use std::collections::{HashMap, HashSet, VecDeque};

/// Whether adding the edge `from -> to` would close a cycle.
///
/// Searches breadth-first from `to` along existing edges (via `deps_of`) and
/// the edges in `pending`, which were accepted earlier in the same batch but
/// are not on disk yet. A cycle exists iff `from` is reachable.
pub fn closes_cycle<F>(from: &str, to: &str, pending: &[(String, String)], mut deps_of: F) -> Result<bool>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    if from == to {
        return Ok(true);
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    visited.insert(to.to_string());
    queue.push_back(to.to_string());

    while let Some(current) = queue.pop_front() {
        let mut next = deps_of(&current)?;
        next.extend(
            pending
                .iter()
                .filter(|(source, _)| source == &current)
                .map(|(_, target)| target.clone()),
        );

        for dep in next {
            if dep == from {
                return Ok(true);
            }
            if visited.insert(dep.clone()) {
                queue.push_back(dep);
            }
        }
    }
    Ok(false)
}

/// Dependencies of `task` that are not completed, in declaration order.
///
/// `status_of` returns `None` for a dependency that no longer exists; such
/// dependencies count as unmet.
pub fn unmet_dependencies<F>(task: &Task, mut status_of: F) -> Result<Vec<String>>
where
    F: FnMut(&str) -> Result<Option<TaskStatus>>,
{
    let mut unmet = Vec::new();
    for dep in &task.dependencies {
        if status_of(dep)? != Some(TaskStatus::Completed) {
            unmet.push(dep.clone());
        }
    }
    Ok(unmet)
}

/// Tasks that list `completed_id` as a dependency and have no other
/// incomplete dependencies. Completed tasks are never reported.
pub fn newly_unblocked<'a>(completed_id: &str, tasks: &'a [Task]) -> Vec<&'a Task> {
    let status: HashMap<&str, TaskStatus> =
        tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();

    tasks
        .iter()
        .filter(|t| t.id != completed_id && t.status != TaskStatus::Completed)
        .filter(|t| t.dependencies.iter().any(|d| d == completed_id))
        .filter(|t| {
            t.dependencies
                .iter()
                .all(|d| d == completed_id || status.get(d.as_str()) == Some(&TaskStatus::Completed))
        })
        .collect()
}

/// Pending tasks whose dependencies are all completed, best candidate first:
/// priority rank, then creation time, then id.
pub fn unblocked_pending(tasks: Vec<Task>) -> Vec<Task> {
    let status: HashMap<String, TaskStatus> =
        tasks.iter().map(|t| (t.id.clone(), t.status)).collect();

    let mut ready: Vec<Task> = tasks
        .into_iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| {
            t.dependencies
                .iter()
                .all(|d| status.get(d) == Some(&TaskStatus::Completed))
        })
        .collect();

    ready.sort_by(|a, b| {
        a.priority
            .rank()
            .cmp(&b.priority.rank())
            .then(a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::model::Priority;
    use chrono::{Duration, Utc};

    fn task(id: &str, status: TaskStatus, deps: &[&str]) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            title: format!("Task {}", id),
            description: String::new(),
            priority: Priority::Medium,
            status,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            blocks: Vec::new(),
            owner: None,
            warning: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: (status == TaskStatus::Completed).then_some(now),
        }
    }

    fn lookup(tasks: &[Task]) -> impl FnMut(&str) -> Result<Vec<String>> + '_ {
        move |id| {
            Ok(tasks
                .iter()
                .find(|t| t.id == id)
                .map(|t| t.dependencies.clone())
                .unwrap_or_default())
        }
    }

    #[test]
    fn test_closes_cycle_detects_transitive_cycle() {
        // a -> b -> c; adding c -> a closes the loop.
        let tasks = vec![
            task("a", TaskStatus::Pending, &["b"]),
            task("b", TaskStatus::Pending, &["c"]),
            task("c", TaskStatus::Pending, &[]),
        ];

        assert!(closes_cycle("c", "a", &[], lookup(&tasks)).unwrap());
        assert!(!closes_cycle("a", "c", &[], lookup(&tasks)).unwrap());
        assert!(closes_cycle("a", "a", &[], lookup(&tasks)).unwrap());
    }

    #[test]
    fn test_closes_cycle_sees_pending_batch_edges() {
        let tasks = vec![
            task("a", TaskStatus::Pending, &[]),
            task("b", TaskStatus::Pending, &[]),
            task("c", TaskStatus::Pending, &[]),
        ];
        // Earlier in the batch: c -> a and b -> c were accepted.
        let pending = vec![
            ("c".to_string(), "a".to_string()),
            ("b".to_string(), "c".to_string()),
        ];

        assert!(closes_cycle("a", "b", &pending, lookup(&tasks)).unwrap());
        assert!(!closes_cycle("a", "b", &[], lookup(&tasks)).unwrap());
    }

    #[test]
    fn test_unmet_dependencies_counts_missing_as_unmet() {
        let t = task("x", TaskStatus::Pending, &["done", "open", "gone"]);
        let unmet = unmet_dependencies(&t, |id| {
            Ok(match id {
                "done" => Some(TaskStatus::Completed),
                "open" => Some(TaskStatus::InProgress),
                _ => None,
            })
        })
        .unwrap();

        assert_eq!(unmet, vec!["open", "gone"]);
    }

    #[test]
    fn test_newly_unblocked_skips_tasks_blocked_elsewhere() {
        let tasks = vec![
            task("a", TaskStatus::Completed, &[]),
            task("b", TaskStatus::Pending, &[]),
            task("c", TaskStatus::Pending, &["a"]),
            task("d", TaskStatus::Pending, &["a", "b"]),
            task("e", TaskStatus::Completed, &["a"]),
        ];

        let ids: Vec<&str> = newly_unblocked("a", &tasks).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[test]
    fn test_unblocked_pending_ordering() {
        let base = Utc::now();
        let mut low = task("low", TaskStatus::Pending, &[]);
        low.priority = Priority::Low;
        let mut high_late = task("high-late", TaskStatus::Pending, &[]);
        high_late.priority = Priority::High;
        high_late.created_at = base + Duration::seconds(10);
        let mut high_early = task("high-early", TaskStatus::Pending, &[]);
        high_early.priority = Priority::High;
        high_early.created_at = base;
        let blocked = task("blocked", TaskStatus::Pending, &["low"]);
        let claimed = task("claimed", TaskStatus::InProgress, &[]);

        let ready = unblocked_pending(vec![low, high_late, blocked, claimed, high_early]);
        let ids: Vec<&str> = ready.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["high-early", "high-late", "low"]);
    }
}
