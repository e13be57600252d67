//! Task operations.
//!
//! Every mutation runs under the shared team-scope lock and an exclusive
//! lock on the task document. Operations return the events they produced;
//! the caller publishes them once all locks are released.

use super::graph;
use super::model::{Task, TaskFilter, TaskInput, TaskPatch, TaskStatus};
use crate::context::validate_id;
use crate::error::{CrewError, Result};
use crate::events::{DispatchEvent, EventType};
use crate::locks::LockMode;
use crate::workspace::Workspace;
use serde_json::json;
use tracing::{debug, info, warn};

fn not_found(team: &str, id: &str) -> CrewError {
    CrewError::NotFound(format!("task '{}' in team '{}'", id, team))
}

fn load_optional(ws: &Workspace, team: &str, id: &str) -> Result<Option<Task>> {
    ws.store.read_optional(&ws.ctx.task_path(team, id))
}

fn status_of(ws: &Workspace, team: &str, id: &str) -> Result<Option<TaskStatus>> {
    Ok(load_optional(ws, team, id)?.map(|t| t.status))
}

fn unmet(ws: &Workspace, team: &str, task: &Task) -> Result<Vec<String>> {
    graph::unmet_dependencies(task, |dep| status_of(ws, team, dep))
}

/// Read-modify-write one task under its own lock.
fn transact<R>(
    ws: &Workspace,
    team: &str,
    id: &str,
    action: &str,
    mutator: impl FnOnce(&mut Task) -> Result<R>,
) -> Result<R> {
    let path = ws.ctx.task_path(team, id);
    if !path.exists() {
        return Err(not_found(team, id));
    }
    ws.store.update(&path, action, || None, mutator)
}

/// Create a pending task with a fresh id. Emits `task.created`.
pub fn create(ws: &Workspace, team: &str, input: TaskInput) -> Result<(Task, Vec<DispatchEvent>)> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(CrewError::UserError("task title must not be empty".to_string()));
    }

    let task = ws.team_scope(team, "task.create", || {
        let now = ws.now();
        let task = Task {
            id: ws.next_id("task"),
            title,
            description: input.description,
            priority: input.priority,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            blocks: Vec::new(),
            owner: None,
            warning: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };

        let path = ws.ctx.task_path(team, &task.id);
        ws.store.with_lock(&path, LockMode::Exclusive, "task.create", || {
            if path.exists() {
                return Err(CrewError::Conflict(format!("task id '{}' already in use", task.id)));
            }
            ws.store.write(&path, &task)
        })?;
        Ok(task)
    })?;

    info!(team, task_id = %task.id, "task created");
    let event = ws.event(
        EventType::TaskCreated,
        team,
        json!({"task_id": task.id, "title": task.title, "priority": task.priority.as_str()}),
    );
    Ok((task, vec![event]))
}

/// Read one task.
pub fn get(ws: &Workspace, team: &str, id: &str) -> Result<Task> {
    validate_id("task", id)?;
    load_optional(ws, team, id)?.ok_or_else(|| not_found(team, id))
}

/// All tasks in the team that match `filter`, ordered by id.
pub fn list(ws: &Workspace, team: &str, filter: &TaskFilter) -> Result<Vec<Task>> {
    if !ws.ctx.team_exists(team) {
        return Err(CrewError::NotFound(format!("team '{}'", team)));
    }
    let tasks: Vec<Task> = ws.store.list(&ws.ctx.tasks_dir(team))?;
    Ok(tasks.into_iter().filter(|t| filter.matches(t)).collect())
}

/// Pending tasks whose dependencies have all completed, best candidate first.
pub fn unblocked_pending(ws: &Workspace, team: &str) -> Result<Vec<Task>> {
    Ok(graph::unblocked_pending(list(ws, team, &TaskFilter::default())?))
}

/// Apply `patch` to a task.
///
/// Rejected before anything is written: status regression, a move into
/// `in_progress` or `completed` with incomplete dependencies, a new
/// incomplete dependency on a task that has already started, a dependency on
/// the task itself or on an unknown task, and any new edge that would close a
/// cycle. New edges are also recorded in each dependency's `blocks` list,
/// one document at a time.
///
/// Emits `task.updated`; on completion also `task.completed` followed by one
/// `task.unblocked` per dependent that has nothing left to wait for.
pub fn update(ws: &Workspace, team: &str, id: &str, patch: TaskPatch) -> Result<(Task, Vec<DispatchEvent>)> {
    validate_id("task", id)?;
    for dep in &patch.add_dependencies {
        validate_id("task", dep)?;
    }

    let (task, previous, added) = ws.team_scope(team, "task.update", || {
        if patch.add_dependencies.is_empty() {
            apply_patch(ws, team, id, &patch)
        } else {
            // Edge additions are serialized team-wide so two concurrent
            // updates cannot each pass the cycle check and jointly close one.
            ws.store.with_lock(&ws.ctx.tasks_dir(team), LockMode::Exclusive, "task.graph", || {
                let result = apply_patch(ws, team, id, &patch)?;
                for dep in &result.2 {
                    record_blocker(ws, team, dep, id);
                }
                Ok(result)
            })
        }
    })?;

    debug!(team, task_id = %task.id, added = added.len(), "task updated");

    let mut events = vec![ws.event(
        EventType::TaskUpdated,
        team,
        json!({
            "task_id": task.id,
            "status": task.status.as_str(),
            "previous_status": previous.as_str(),
            "owner": task.owner,
            "added_dependencies": added,
        }),
    )];

    if previous != TaskStatus::Completed && task.status == TaskStatus::Completed {
        info!(team, task_id = %task.id, "task completed");
        events.push(ws.event(
            EventType::TaskCompleted,
            team,
            json!({"task_id": task.id, "title": task.title, "owner": task.owner}),
        ));

        // The completion is already durable; an unreadable sibling must not
        // suppress its events.
        let all: Vec<Task> = ws
            .store
            .list_readable(&ws.ctx.tasks_dir(team))
            .unwrap_or_else(|e| {
                warn!(team, task_id = %task.id, error = %e, "cannot scan dependents");
                Vec::new()
            });
        for dependent in graph::newly_unblocked(&task.id, &all) {
            events.push(ws.event(
                EventType::TaskUnblocked,
                team,
                json!({
                    "task_id": dependent.id,
                    "title": dependent.title,
                    "unblocked_by": task.id,
                }),
            ));
        }
    }

    Ok((task, events))
}

fn apply_patch(
    ws: &Workspace,
    team: &str,
    id: &str,
    patch: &TaskPatch,
) -> Result<(Task, TaskStatus, Vec<String>)> {
    transact(ws, team, id, "task.update", |task: &mut Task| {
        let previous = task.status;
        if let Some(next) = patch.status
            && next < task.status
        {
            return Err(CrewError::Conflict(format!(
                "task '{}' cannot move from {} back to {}",
                task.id, task.status, next
            )));
        }

        let mut added: Vec<String> = Vec::new();
        let mut batch: Vec<(String, String)> = Vec::new();
        for dep in &patch.add_dependencies {
            if dep == &task.id {
                return Err(CrewError::Conflict(format!("task '{}' cannot depend on itself", dep)));
            }
            if task.dependencies.contains(dep) || added.contains(dep) {
                continue;
            }
            if load_optional(ws, team, dep)?.is_none() {
                return Err(not_found(team, dep));
            }
            let cycle = graph::closes_cycle(&task.id, dep, &batch, |node| {
                if node == task.id {
                    return Ok(task.dependencies.clone());
                }
                Ok(load_optional(ws, team, node)?
                    .map(|t| t.dependencies)
                    .unwrap_or_default())
            })?;
            if cycle {
                return Err(CrewError::Conflict(format!(
                    "adding dependency '{}' to task '{}' would create a cycle",
                    dep, task.id
                )));
            }
            batch.push((task.id.clone(), dep.clone()));
            added.push(dep.clone());
        }
        task.dependencies.extend(added.iter().cloned());

        let target = patch.status.unwrap_or(task.status);
        if target > previous || (target > TaskStatus::Pending && !added.is_empty()) {
            let mut unmet = unmet(ws, team, task)?;
            if target == previous {
                // Already started: only the new edges must be satisfied.
                unmet.retain(|dep| added.contains(dep));
            }
            if !unmet.is_empty() {
                return Err(CrewError::Conflict(format!(
                    "task '{}' cannot move to {}: dependencies not completed: {}",
                    task.id,
                    target,
                    unmet.join(", ")
                )));
            }
        }

        let now = ws.now();
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = description.clone();
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(owner) = &patch.owner {
            task.owner = Some(owner.clone());
        }
        if target != previous {
            task.status = target;
            if target >= TaskStatus::InProgress && task.started_at.is_none() {
                task.started_at = Some(now);
            }
            if target == TaskStatus::Completed {
                task.completed_at = Some(now);
            }
        }
        task.updated_at = now;

        Ok((task.clone(), previous, added))
    })
}

/// Add `dependent` to the `blocks` list of `dep`. Failure is logged; the
/// dependency edge itself is already durable.
fn record_blocker(ws: &Workspace, team: &str, dep: &str, dependent: &str) {
    let result = transact(ws, team, dep, "task.blocks", |task: &mut Task| {
        if !task.blocks.iter().any(|b| b == dependent) {
            task.blocks.push(dependent.to_string());
            task.updated_at = ws.now();
        }
        Ok(())
    });
    if let Err(e) = result {
        warn!(team, task_id = dep, dependent, error = %e, "failed to update blocks list");
    }
}

/// Claim a pending task for `agent`.
///
/// Unmet dependencies refuse the claim unless `allow_soft_block` is set, in
/// which case the claim proceeds and the task carries a warning. Emits
/// `task.claimed`.
pub fn claim(
    ws: &Workspace,
    team: &str,
    id: &str,
    agent: &str,
    allow_soft_block: bool,
) -> Result<(Task, Vec<DispatchEvent>)> {
    validate_id("task", id)?;
    validate_id("agent", agent)?;

    let task = ws.team_scope(team, "task.claim", || {
        transact(ws, team, id, "task.claim", |task: &mut Task| {
            if task.status != TaskStatus::Pending {
                let owner = task.owner.as_deref().unwrap_or("nobody");
                return Err(CrewError::Conflict(format!(
                    "task '{}' is {} (owner: {}), only pending tasks can be claimed",
                    task.id, task.status, owner
                )));
            }

            let unmet = unmet(ws, team, task)?;
            if !unmet.is_empty() {
                if !allow_soft_block {
                    return Err(CrewError::Conflict(format!(
                        "task '{}' is blocked by unfinished dependencies: {}",
                        task.id,
                        unmet.join(", ")
                    )));
                }
                warn!(team, task_id = %task.id, agent, unmet = %unmet.join(","), "claiming soft-blocked task");
                task.warning = Some(format!(
                    "claimed before dependencies completed: {}",
                    unmet.join(", ")
                ));
            }

            let now = ws.now();
            task.status = TaskStatus::InProgress;
            task.owner = Some(agent.to_string());
            task.started_at = Some(now);
            task.updated_at = now;
            Ok(task.clone())
        })
    })?;

    info!(team, task_id = %task.id, agent, "task claimed");
    let event = ws.event(
        EventType::TaskClaimed,
        team,
        json!({"task_id": task.id, "owner": agent, "warning": task.warning}),
    );
    Ok((task, vec![event]))
}
