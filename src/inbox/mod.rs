//! Per-agent inboxes.
//!
//! Messages are appended to the recipient's inbox document under its lock.
//! Polling marks returned messages read; there is no acknowledgement or
//! redelivery beyond that.

mod model;
mod ops;


pub use model::{Inbox, Message, MessageBody, PollResult};
pub use ops::{READ_RETENTION, broadcast, messages, poll, send};
