//! Hooks for starting and stopping agent worker processes.
//!
//! crewfs only records agent state; actually running a worker is delegated
//! to an [`Orchestrator`]. The default does nothing. [`CommandOrchestrator`]
//! runs configured shell-style command templates.

use super::model::AgentState;
use super::template::{TemplateError, render};
use crate::config::Config;
use crate::context::{AGENT_ENV, ROOT_ENV, TEAM_ENV};
use crate::error::{CrewError, Result};
use crate::workspace::Workspace;
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Starts and stops the process behind an agent.
pub trait Orchestrator: Send + Sync {
    /// Start a worker for `agent`. Returns its pid when one is known.
    fn launch(&self, ws: &Workspace, team: &str, agent: &AgentState) -> Result<Option<u32>>;

    /// Stop the worker for `agent`.
    fn stop(&self, ws: &Workspace, team: &str, agent: &AgentState) -> Result<()>;
}

/// Tracks state only; never starts a process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOrchestrator;

impl Orchestrator for NoopOrchestrator {
    fn launch(&self, _ws: &Workspace, team: &str, agent: &AgentState) -> Result<Option<u32>> {
        debug!(team, agent = %agent.id, "no orchestrator configured, nothing to launch");
        Ok(None)
    }

    fn stop(&self, _ws: &Workspace, _team: &str, _agent: &AgentState) -> Result<()> {
        Ok(())
    }
}

/// Runs command templates from the config.
///
/// The launch command is spawned detached with its output appended to
/// `teams/<team>/logs/<agent>.{stdout,stderr}.log` and `CREWFS_ROOT`,
/// `CREWFS_TEAM`, `CREWFS_AGENT` set. The stop command is run to completion
/// and killed if it outlives the timeout.
///
/// Launched children are kept until they are reaped: on `stop` the worker is
/// waited for (and killed after the timeout), and every `launch` first
/// collects workers that have already exited.
#[derive(Debug)]
pub struct CommandOrchestrator {
    launch: String,
    stop: Option<String>,
    stop_timeout: Duration,
    children: Mutex<HashMap<u32, Child>>,
}

impl CommandOrchestrator {
    pub fn new(launch: impl Into<String>, stop: Option<String>, stop_timeout: Duration) -> Self {
        Self {
            launch: launch.into(),
            stop,
            stop_timeout,
            children: Mutex::new(HashMap::new()),
        }
    }

    fn children(&self) -> MutexGuard<'_, HashMap<u32, Child>> {
        self.children.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Collect workers that have exited on their own.
    fn reap_exited(&self) {
        self.children().retain(|pid, child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid, %status, "agent process exited");
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(pid, error = %e, "cannot check agent process, forgetting it");
                false
            }
        });
    }

    fn run_stop_command(&self, ws: &Workspace, team: &str, agent: &AgentState, template: &str) -> Result<()> {
        let (mut command, rendered) = build_command(template, &variables(ws, team, agent))?;
        let mut child = command
            .env(ROOT_ENV, &ws.ctx.root)
            .env(TEAM_ENV, team)
            .env(AGENT_ENV, &agent.id)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CrewError::Io(format!("failed to run stop command '{}': {}", rendered, e)))?;

        match wait_with_timeout(&mut child, self.stop_timeout)? {
            Some(0) => {
                debug!(team, agent = %agent.id, "stop command finished");
                Ok(())
            }
            Some(code) => Err(CrewError::Io(format!(
                "stop command '{}' exited with status {}",
                rendered, code
            ))),
            None => Err(CrewError::Io(format!(
                "stop command '{}' did not finish within {}s and was killed",
                rendered,
                self.stop_timeout.as_secs()
            ))),
        }
    }
}

/// The orchestrator described by `config`.
pub fn from_config(config: &Config) -> Box<dyn Orchestrator> {
    match &config.agent_launch_command {
        Some(launch) => Box::new(CommandOrchestrator::new(
            launch.clone(),
            config.agent_stop_command.clone(),
            Duration::from_secs(config.agent_stop_timeout_secs),
        )),
        None => Box::new(NoopOrchestrator),
    }
}

fn variables<'a>(ws: &Workspace, team: &str, agent: &AgentState) -> BTreeMap<&'a str, String> {
    let mut vars = BTreeMap::new();
    vars.insert("root", ws.ctx.root.display().to_string());
    vars.insert("team", team.to_string());
    vars.insert("agent", agent.id.clone());
    vars.insert("role", agent.role.clone());
    if let Some(pid) = agent.pid {
        vars.insert("pid", pid.to_string());
    }
    vars
}

/// Render and split a template into program and arguments.
fn build_command(template: &str, vars: &BTreeMap<&str, String>) -> Result<(Command, String)> {
    let rendered = render(template, vars).map_err(|e| match e {
        TemplateError::UndefinedVariable { name, .. } => CrewError::UserError(format!(
            "orchestrator command references undefined variable '{}'\n\
             Command: {}\n\
             Available variables: {}",
            name,
            template,
            vars.keys().copied().collect::<Vec<_>>().join(", ")
        )),
        other => CrewError::UserError(format!(
            "invalid orchestrator command '{}': {}",
            template, other
        )),
    })?;

    let args = shell_words::split(&rendered).map_err(|e| {
        CrewError::UserError(format!(
            "failed to parse orchestrator command '{}': {}\n\
             Fix: check for unmatched quotes or invalid escape sequences.",
            rendered, e
        ))
    })?;
    let Some((program, rest)) = args.split_first() else {
        return Err(CrewError::UserError(format!(
            "orchestrator command is empty after parsing: '{}'",
            rendered
        )));
    };

    let mut command = Command::new(program);
    command.args(rest);
    Ok((command, rendered))
}

fn open_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CrewError::Io(format!("failed to open log '{}': {}", path.display(), e)))
}

impl Orchestrator for CommandOrchestrator {
    fn launch(&self, ws: &Workspace, team: &str, agent: &AgentState) -> Result<Option<u32>> {
        self.reap_exited();
        let (mut command, rendered) = build_command(&self.launch, &variables(ws, team, agent))?;

        let logs_dir = ws.ctx.team_dir(team).join("logs");
        std::fs::create_dir_all(&logs_dir).map_err(|e| {
            CrewError::Io(format!(
                "failed to create logs directory '{}': {}",
                logs_dir.display(),
                e
            ))
        })?;
        let stdout = open_log(&logs_dir.join(format!("{}.stdout.log", agent.id)))?;
        let stderr = open_log(&logs_dir.join(format!("{}.stderr.log", agent.id)))?;

        let child = command
            .env(ROOT_ENV, &ws.ctx.root)
            .env(TEAM_ENV, team)
            .env(AGENT_ENV, &agent.id)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| {
                CrewError::Io(format!(
                    "failed to launch agent '{}' with '{}': {}\n\
                     Fix: ensure the command is installed and in PATH.",
                    agent.id, rendered, e
                ))
            })?;

        let pid = child.id();
        info!(team, agent = %agent.id, pid, command = %rendered, "agent process launched");
        self.children().insert(pid, child);
        Ok(Some(pid))
    }

    fn stop(&self, ws: &Workspace, team: &str, agent: &AgentState) -> Result<()> {
        let Some(template) = &self.stop else {
            warn!(team, agent = %agent.id, pid = ?agent.pid, "no stop command configured, leaving process running");
            self.reap_exited();
            return Ok(());
        };

        let tracked = agent.pid.and_then(|pid| self.children().remove(&pid));
        let result = self.run_stop_command(ws, team, agent, template);

        if let Some(mut child) = tracked {
            match wait_with_timeout(&mut child, self.stop_timeout) {
                Ok(code) => debug!(team, agent = %agent.id, pid = child.id(), ?code, "agent process reaped"),
                Err(e) => warn!(team, agent = %agent.id, error = %e, "failed to reap agent process"),
            }
        }
        result
    }
}

/// Wait for `child`, killing it after `timeout`. Returns the exit code, or
/// `None` if it was killed or ended by a signal.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<i32>> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(20);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code()),
            Ok(None) if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            Ok(None) => std::thread::sleep(poll_interval),
            Err(e) => {
                return Err(CrewError::Io(format!("failed to check process status: {}", e)));
            }
        }
    }
}
