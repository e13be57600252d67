//! Sending and polling messages.

use super::model::{Inbox, Message, MessageBody, PollResult};
use crate::context::validate_id;
use crate::error::{CrewError, Result};
use crate::events::{DispatchEvent, EventType};
use crate::team;
use crate::workspace::Workspace;
use serde_json::json;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Read messages retained per inbox; older read messages are dropped.
pub const READ_RETENTION: usize = 100;

fn transact<R>(
    ws: &Workspace,
    team: &str,
    agent: &str,
    action: &str,
    mutator: impl FnOnce(&mut Inbox) -> Result<R>,
) -> Result<R> {
    ws.team_scope(team, action, || {
        ws.store.update(
            &ws.ctx.inbox_path(team, agent),
            action,
            || Some(Inbox::new(agent)),
            mutator,
        )
    })
}

fn deliver(ws: &Workspace, team: &str, from: &str, to: &str, body: &MessageBody) -> Result<(Message, DispatchEvent)> {
    let message = Message {
        id: ws.next_id("msg"),
        from: from.to_string(),
        to: to.to_string(),
        sent_at: ws.now(),
        read: false,
        body: body.clone(),
    };

    let stored = message.clone();
    transact(ws, team, to, "inbox.send", move |inbox| {
        inbox.messages.push(stored);
        Ok(())
    })?;

    debug!(team, from, to, kind = body.kind(), "message delivered");
    let event = ws.event(
        EventType::MessageSent,
        team,
        json!({
            "message_id": message.id,
            "from": from,
            "to": to,
            "kind": body.kind(),
        }),
    );
    Ok((message, event))
}

/// Deliver `body` to one team member. Emits `message.sent`.
pub fn send(
    ws: &Workspace,
    team: &str,
    from: &str,
    to: &str,
    body: MessageBody,
) -> Result<(Message, Vec<DispatchEvent>)> {
    validate_id("agent", to)?;
    let config = team::get_team(ws, team)?;
    if !config.is_member(to) {
        return Err(CrewError::NotFound(format!(
            "agent '{}' is not a member of team '{}'",
            to, team
        )));
    }

    let (message, event) = deliver(ws, team, from, to, &body)?;
    Ok((message, vec![event]))
}

/// Deliver `body` to every member except `from`. Emits one `message.sent`
/// per delivered message.
///
/// A failed delivery is logged and the remaining members still receive the
/// message. Fails only when no member could be reached.
pub fn broadcast(
    ws: &Workspace,
    team: &str,
    from: &str,
    body: MessageBody,
) -> Result<(Vec<Message>, Vec<DispatchEvent>)> {
    let config = team::get_team(ws, team)?;

    let mut messages = Vec::new();
    let mut events = Vec::new();
    let mut first_error = None;
    for member in config.members.iter().filter(|m| m.id != from) {
        match deliver(ws, team, from, &member.id, &body) {
            Ok((message, event)) => {
                messages.push(message);
                events.push(event);
            }
            Err(e) => {
                warn!(team, from, to = %member.id, error = %e, "broadcast delivery failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if messages.is_empty() => Err(e),
        _ => Ok((messages, events)),
    }
}

/// Every message in the inbox, read or not, without marking anything.
pub fn messages(ws: &Workspace, team: &str, agent: &str) -> Result<Vec<Message>> {
    validate_id("agent", agent)?;
    let inbox: Option<Inbox> = ws.store.read_optional(&ws.ctx.inbox_path(team, agent))?;
    Ok(inbox.map(|i| i.messages).unwrap_or_default())
}

/// Take unread messages, marking them read.
fn take_unread(ws: &Workspace, team: &str, agent: &str) -> Result<Vec<Message>> {
    if !ws.ctx.inbox_path(team, agent).exists() {
        if !ws.ctx.team_exists(team) {
            return Err(CrewError::NotFound(format!("team '{}'", team)));
        }
        return Ok(Vec::new());
    }

    transact(ws, team, agent, "inbox.poll", |inbox| {
        let unread: Vec<Message> = inbox.unread().cloned().collect();
        if unread.is_empty() {
            return Ok(unread);
        }
        for message in inbox.messages.iter_mut() {
            message.read = true;
        }
        inbox.prune_read(READ_RETENTION);
        Ok(unread)
    })
}

/// Return unread messages for `agent`, marking them read.
///
/// With nothing unread, checks again every configured poll interval until
/// `timeout` has passed, then returns an empty result with `timed_out` set.
/// A zero timeout checks once.
pub fn poll(ws: &Workspace, team: &str, agent: &str, timeout: Duration) -> Result<PollResult> {
    validate_id("agent", agent)?;
    let started = Instant::now();
    let interval = ws.config.inbox_poll_interval();

    loop {
        let messages = take_unread(ws, team, agent)?;
        if !messages.is_empty() {
            return Ok(PollResult {
                messages,
                timed_out: false,
            });
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            debug!(team, agent, "inbox poll timed out");
            return Ok(PollResult {
                messages,
                timed_out: true,
            });
        }
        thread::sleep(interval.min(timeout - elapsed));
    }
}
