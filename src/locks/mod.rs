//! Locking subsystem for crewfs.
//!
//! Advisory shared/exclusive locks over named resources, honored by every
//! cooperating process that goes through [`LockManager`].
//!
//! # Lock Files
//!
//! The lock for a resource at path `P` lives next to it:
//! - `P.lock`: the exclusive marker, created with **create_new** semantics
//! - `P.lock.readers/`: one marker file per shared holder
//!
//! # Lock Metadata
//!
//! Each marker contains JSON metadata:
//! - `owner`: The owner of the lock (e.g., `user@HOST`)
//! - `pid`: The process ID (optional)
//! - `created_at`: RFC3339 timestamp
//! - `mode`: `shared` or `exclusive`
//! - `action`: The operation holding the lock
//!
//! # RAII Guards
//!
//! Locks are released by [`LockGuard`] on drop, so a protected section that
//! errors or unwinds still releases. Markers left by a crashed holder are
//! reclaimed once they exceed the configured stale threshold.

mod guard;
mod metadata;
mod operations;
mod types;


pub use guard::LockGuard;
pub use metadata::LockMetadata;
pub use operations::{
    LockManager, LockOptions, clear_lock, list_locks, lock_path_for, readers_dir_for,
};
pub use types::{LockInfo, LockMode};
