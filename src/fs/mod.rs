//! Filesystem utilities for crewfs.
//!
//! Atomic writes are the only way documents reach disk, so a reader can never
//! observe a partially written file.

pub mod atomic;

pub use atomic::{StagedWrite, atomic_write};
