//! Task graph for crewfs.
//!
//! Tasks are JSON documents under `teams/<team>/tasks/`. Each records the
//! tasks it depends on (`dependencies`) and, as reverse edges, the tasks
//! waiting on it (`blocks`). The module enforces:
//!
//! - Status only moves forward: `pending -> in_progress -> completed`
//! - A task cannot start or complete while a dependency is unfinished
//! - The dependency graph stays acyclic
//! - Completing a task reports each dependent it fully unblocks, once
//!
//! # Task Document
//!
//! ```text
//! {
//!   "id": "task-3f9a1c2b7d4e",
//!   "title": "Wire up the parser",
//!   "priority": "high",
//!   "status": "pending",
//!   "dependencies": ["task-0b12c9e4aa10"],
//!   "blocks": [],
//!   "created_at": "2026-01-15T09:00:00Z",
//!   "updated_at": "2026-01-15T09:00:00Z"
//! }
//! ```

mod graph;
mod model;
mod ops;


pub use model::{Priority, Task, TaskFilter, TaskInput, TaskPatch, TaskStatus};
pub use ops::{claim, create, get, list, unblocked_pending, update};
