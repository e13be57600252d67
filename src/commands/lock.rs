//! `crewfs lock` subcommands.

use super::{Session, print_json};
use crate::cli::{LockAction, LockClearArgs};
use crewfs::error::{CrewError, Result};
use crewfs::locks::{self, LockInfo};
use serde_json::{Value, json};
use tracing::warn;

pub fn run(session: &Session, action: LockAction) -> Result<()> {
    match action {
        LockAction::List => cmd_list(session),
        LockAction::Clear(args) => cmd_clear(session, args),
    }
}

fn describe(info: &LockInfo) -> Value {
    json!({
        "resource": info.resource,
        "path": info.path,
        "mode": info.mode,
        "owner": info.metadata.owner,
        "pid": info.metadata.pid,
        "action": info.metadata.action,
        "created_at": info.metadata.created_at,
        "age": info.metadata.age_string(),
        "stale": info.is_stale,
    })
}

fn cmd_list(session: &Session) -> Result<()> {
    let ws = session.crew.workspace();
    let locks = locks::list_locks(&ws.ctx.root, ws.config.lock_stale_minutes)?;
    print_json(&locks.iter().map(describe).collect::<Vec<_>>())
}

fn cmd_clear(session: &Session, args: LockClearArgs) -> Result<()> {
    if !args.force {
        return Err(CrewError::UserError(format!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing locks can corrupt documents if the holder is still active.\n\
             Only clear locks if you are certain the holder has crashed.\n\n\
             To clear the lock, run:\n  crewfs lock clear {} --force",
            args.resource
        )));
    }

    let ws = session.crew.workspace();
    let cleared = locks::clear_lock(&ws.ctx.root.join(&args.resource), ws.config.lock_stale_minutes)?;
    for info in &cleared {
        warn!(resource = %info.resource.display(), owner = %info.metadata.owner, "lock cleared by force");
    }
    print_json(&cleared.iter().map(describe).collect::<Vec<_>>())
}
