//! CLI argument parsing for crewfs.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use crewfs::agent::AgentStatus;
use crewfs::task::{Priority, TaskStatus};
use crewfs::team::Topology;

/// crewfs: file-based coordination for multi-agent teams.
///
/// Teams, tasks, agents, and inboxes are JSON documents below a storage root
/// (`CREWFS_ROOT`, default `./.crewfs`). Every command prints JSON on success.
#[derive(Parser, Debug)]
#[command(name = "crewfs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Active team. Overrides CREWFS_TEAM.
    #[arg(long, global = true)]
    pub team: Option<String>,

    /// Acting agent. Overrides CREWFS_AGENT.
    #[arg(long, global = true)]
    pub agent: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for crewfs.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Team lifecycle and membership.
    Team(TeamCommand),

    /// Create, update, and claim tasks.
    Task(TaskCommand),

    /// Spawn, terminate, and track agents.
    Agent(AgentCommand),

    /// Send and poll inbox messages.
    Msg(MsgCommand),

    /// Manage dispatch rules.
    Rule(RuleCommand),

    /// Show the team's dispatch log, oldest first.
    Log(LogArgs),

    /// Inspect or clear lock markers.
    Lock(LockCommand),
}

// ============================================================================
// team
// ============================================================================

#[derive(Parser, Debug)]
pub struct TeamCommand {
    #[command(subcommand)]
    pub action: TeamAction,
}

#[derive(Subcommand, Debug)]
pub enum TeamAction {
    /// Create a team led by the acting agent.
    Create(TeamCreateArgs),

    /// Show the active team's config.
    Show,

    /// List all teams.
    List,

    /// Join the active team as the acting agent.
    Join(TeamJoinArgs),

    /// Leave the active team as the acting agent.
    Leave,

    /// Delete the active team and everything under it.
    Delete,
}

#[derive(Parser, Debug)]
pub struct TeamCreateArgs {
    /// Team name.
    pub name: String,

    /// Topology (flat, hierarchical, mesh, pipeline).
    #[arg(long)]
    pub topology: Option<Topology>,

    /// Role definitions as a JSON object, e.g.
    /// '{"worker": {"permissions": []}}'.
    #[arg(long)]
    pub roles: Option<String>,
}

#[derive(Parser, Debug)]
pub struct TeamJoinArgs {
    /// Role to join with.
    #[arg(long)]
    pub role: String,
}

// ============================================================================
// task
// ============================================================================

#[derive(Parser, Debug)]
pub struct TaskCommand {
    #[command(subcommand)]
    pub action: TaskAction,
}

#[derive(Subcommand, Debug)]
pub enum TaskAction {
    /// Create a task.
    Create(TaskCreateArgs),

    /// Show one task.
    Show(TaskIdArgs),

    /// List tasks, optionally filtered.
    List(TaskListArgs),

    /// Apply a partial update.
    Update(TaskUpdateArgs),

    /// Claim a task as the acting agent.
    Claim(TaskClaimArgs),

    /// List pending tasks whose dependencies are all completed.
    Unblocked,
}

#[derive(Parser, Debug)]
pub struct TaskCreateArgs {
    /// Task title.
    pub title: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Priority (high, medium, low).
    #[arg(short, long, default_value = "medium")]
    pub priority: Priority,

    /// Task IDs this task depends on.
    #[arg(long, value_delimiter = ',')]
    pub depends_on: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct TaskIdArgs {
    pub task_id: String,
}

#[derive(Parser, Debug)]
pub struct TaskListArgs {
    #[arg(long)]
    pub status: Option<TaskStatus>,

    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Parser, Debug)]
pub struct TaskUpdateArgs {
    pub task_id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(short, long)]
    pub priority: Option<Priority>,

    /// New status (pending, in_progress, completed). Never moves backwards.
    #[arg(long)]
    pub status: Option<TaskStatus>,

    #[arg(long)]
    pub owner: Option<String>,

    /// Dependencies to add.
    #[arg(long, value_delimiter = ',')]
    pub depends_on: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct TaskClaimArgs {
    pub task_id: String,

    /// Claim even if dependencies are incomplete, recording a warning.
    #[arg(long)]
    pub force: bool,
}

// ============================================================================
// agent
// ============================================================================

#[derive(Parser, Debug)]
pub struct AgentCommand {
    #[command(subcommand)]
    pub action: AgentAction,
}

#[derive(Subcommand, Debug)]
pub enum AgentAction {
    /// Spawn an agent into the active team.
    Spawn(AgentSpawnArgs),

    /// Shut an agent down.
    Terminate(AgentIdArgs),

    /// Set an agent's lifecycle status.
    Status(AgentStatusArgs),

    /// Record a heartbeat for the acting agent.
    Heartbeat,

    /// Mark agents with too many missed heartbeats inactive.
    Sweep,

    /// Show one agent.
    Show(AgentIdArgs),

    /// List the team's agents.
    List,
}

#[derive(Parser, Debug)]
pub struct AgentSpawnArgs {
    /// Id of the new agent.
    pub agent_id: String,

    #[arg(long)]
    pub role: String,
}

#[derive(Parser, Debug)]
pub struct AgentIdArgs {
    pub agent_id: String,
}

#[derive(Parser, Debug)]
pub struct AgentStatusArgs {
    pub agent_id: String,

    /// spawning, active, idle, inactive, shutting_down, or terminated.
    pub status: AgentStatus,
}

// ============================================================================
// msg
// ============================================================================

#[derive(Parser, Debug)]
pub struct MsgCommand {
    #[command(subcommand)]
    pub action: MsgAction,
}

#[derive(Subcommand, Debug)]
pub enum MsgAction {
    /// Send a text message to one member.
    Send(MsgSendArgs),

    /// Send a text message to every other member.
    Broadcast(MsgBroadcastArgs),

    /// Wait for unread messages and mark them read.
    Poll(MsgPollArgs),

    /// Show the acting agent's inbox without marking anything read.
    List,
}

#[derive(Parser, Debug)]
pub struct MsgSendArgs {
    /// Recipient agent id.
    pub to: String,

    pub text: String,
}

#[derive(Parser, Debug)]
pub struct MsgBroadcastArgs {
    pub text: String,
}

#[derive(Parser, Debug)]
pub struct MsgPollArgs {
    /// Seconds to wait. Defaults to `inbox_poll_timeout_secs`.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

// ============================================================================
// rule
// ============================================================================

#[derive(Parser, Debug)]
pub struct RuleCommand {
    #[command(subcommand)]
    pub action: RuleAction,
}

#[derive(Subcommand, Debug)]
pub enum RuleAction {
    /// Add a rule from its JSON definition.
    ///
    /// Example: '{"event_type": "task.unblocked", "action": {"type": "assign_task"}}'
    Add(RuleAddArgs),

    /// Remove a rule.
    Remove(RuleIdArgs),

    /// Enable a rule.
    Enable(RuleIdArgs),

    /// Disable a rule.
    Disable(RuleIdArgs),

    /// List the team's rules.
    List,
}

#[derive(Parser, Debug)]
pub struct RuleAddArgs {
    pub json: String,
}

#[derive(Parser, Debug)]
pub struct RuleIdArgs {
    pub rule_id: String,
}

#[derive(Parser, Debug)]
pub struct LogArgs {
    /// Show only the most recent N entries.
    #[arg(long)]
    pub limit: Option<usize>,
}

// ============================================================================
// lock
// ============================================================================

#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// List all lock markers under the storage root.
    List,

    /// Clear every marker on a resource.
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(LockClearArgs),
}

#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Path of the locked resource, relative to the storage root.
    pub resource: String,

    /// Force clearing the lock (required for safety).
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_task_create_full() {
        let cli = Cli::try_parse_from([
            "crewfs",
            "--team",
            "alpha",
            "task",
            "create",
            "Write docs",
            "--priority",
            "high",
            "--depends-on",
            "task-1,task-2",
        ])
        .unwrap();
        assert_eq!(cli.team.as_deref(), Some("alpha"));
        if let Command::Task(TaskCommand {
            action: TaskAction::Create(args),
        }) = cli.command
        {
            assert_eq!(args.title, "Write docs");
            assert_eq!(args.priority, Priority::High);
            assert_eq!(args.depends_on, vec!["task-1", "task-2"]);
        } else {
            panic!("Expected task create");
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["crewfs", "task", "claim", "task-3", "--agent", "w1", "--force"]).unwrap();
        assert_eq!(cli.agent.as_deref(), Some("w1"));
        if let Command::Task(TaskCommand {
            action: TaskAction::Claim(args),
        }) = cli.command
        {
            assert_eq!(args.task_id, "task-3");
            assert!(args.force);
        } else {
            panic!("Expected task claim");
        }
    }

    #[test]
    fn parse_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["crewfs", "task", "update", "t", "--status", "done"]).is_err());
        assert!(Cli::try_parse_from(["crewfs", "agent", "status", "w1", "sleeping"]).is_err());
    }

    #[test]
    fn parse_lock_clear_requires_resource() {
        assert!(Cli::try_parse_from(["crewfs", "lock", "clear"]).is_err());
        let cli = Cli::try_parse_from(["crewfs", "lock", "clear", "teams/alpha", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Lock(LockCommand {
                action: LockAction::Clear(LockClearArgs { force: true, .. })
            })
        ));
    }
}
