//! `crewfs task` subcommands.

use super::{Session, print_json};
use crate::cli::{TaskAction, TaskCreateArgs, TaskUpdateArgs};
use crewfs::error::Result;
use crewfs::task::{TaskFilter, TaskInput, TaskPatch};

pub fn run(session: &Session, action: TaskAction) -> Result<()> {
    let crew = &session.crew;
    match action {
        TaskAction::Create(args) => cmd_create(session, args),
        TaskAction::Show(args) => print_json(&crew.get_task(session.team()?, &args.task_id)?),
        TaskAction::List(args) => {
            let filter = TaskFilter {
                status: args.status,
                owner: args.owner,
            };
            print_json(&crew.list_tasks(session.team()?, &filter)?)
        }
        TaskAction::Update(args) => cmd_update(session, args),
        TaskAction::Claim(args) => print_json(&crew.claim_task(
            session.team()?,
            &args.task_id,
            session.agent()?,
            args.force,
        )?),
        TaskAction::Unblocked => print_json(&crew.unblocked_tasks(session.team()?)?),
    }
}

fn cmd_create(session: &Session, args: TaskCreateArgs) -> Result<()> {
    let team = session.team()?;
    let mut task = session.crew.create_task(
        team,
        TaskInput {
            title: args.title,
            description: args.description,
            priority: args.priority,
        },
    )?;
    if !args.depends_on.is_empty() {
        task = session.crew.update_task(
            team,
            &task.id,
            TaskPatch {
                add_dependencies: args.depends_on,
                ..TaskPatch::default()
            },
        )?;
    }
    print_json(&task)
}

fn cmd_update(session: &Session, args: TaskUpdateArgs) -> Result<()> {
    let patch = TaskPatch {
        title: args.title,
        description: args.description,
        priority: args.priority,
        status: args.status,
        owner: args.owner,
        add_dependencies: args.depends_on,
    };
    print_json(&session.crew.update_task(session.team()?, &args.task_id, patch)?)
}
