//! Exit code constants for the crewfs CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, missing context, I/O)
//! - 2: Validation failure (malformed or mis-shaped documents)
//! - 3: Conflict (status regression, cycle, blocked claim, permission)
//! - 4: Lock acquisition failure
//! - 5: Referenced entity not found

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, missing ambient context, or I/O failure.
pub const USER_ERROR: i32 = 1;

/// Validation failure: a document failed to parse or did not match its shape.
pub const VALIDATION_FAILURE: i32 = 2;

/// Conflict with current state, including permission refusals.
pub const CONFLICT: i32 = 3;

/// Lock acquisition failure.
pub const LOCK_FAILURE: i32 = 4;

/// A referenced team, task, agent, or rule does not exist.
pub const NOT_FOUND: i32 = 5;
