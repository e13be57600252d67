//! Tests for team lifecycle, membership, and permissions.

use super::*;
use crate::error::CrewError;
use crate::events::EventType;
use crate::test_support::{create_test_team, test_workspace};
use std::collections::BTreeMap;

fn roles() -> BTreeMap<String, RoleDef> {
    let mut roles = BTreeMap::new();
    roles.insert(
        "coordinator".to_string(),
        RoleDef {
            description: Some("Runs the board".to_string()),
            permissions: vec![Permission::ManageRules, Permission::ManageAgents],
        },
    );
    roles.insert("worker".to_string(), RoleDef::default());
    roles
}

#[test]
fn test_create_team_records_leader_as_member() {
    let t = test_workspace();
    let (team, events) = create_team(
        &t.ws,
        NewTeam {
            name: "alpha".to_string(),
            leader: "lead".to_string(),
            topology: Some(Topology::Hierarchical),
            roles: None,
        },
    )
    .unwrap();

    assert_eq!(team.leader, "lead");
    assert_eq!(team.members.len(), 1);
    assert_eq!(team.members[0].role, LEADER_ROLE);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::TeamCreated);

    let loaded = get_team(&t.ws, "alpha").unwrap();
    assert_eq!(loaded, team);
}

#[test]
fn test_create_team_twice_conflicts() {
    let t = test_workspace();
    create_test_team(&t.ws, "alpha", "lead", &[]);

    let err = create_team(
        &t.ws,
        NewTeam {
            name: "alpha".to_string(),
            leader: "other".to_string(),
            ..NewTeam::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, CrewError::Conflict(_)));
}

#[test]
fn test_create_team_rejects_bad_name() {
    let t = test_workspace();
    let err = create_team(
        &t.ws,
        NewTeam {
            name: "../escape".to_string(),
            leader: "lead".to_string(),
            ..NewTeam::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, CrewError::UserError(_)));
}

#[test]
fn test_team_name_cannot_shadow_lock_marker() {
    let t = test_workspace();
    create_test_team(&t.ws, "foo", "lead", &[]);

    for name in ["foo.lock", "foo.lock.readers"] {
        let err = create_team(
            &t.ws,
            NewTeam {
                name: name.to_string(),
                leader: "lead".to_string(),
                ..NewTeam::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, CrewError::UserError(_)), "{name}: {err}");
    }
    assert!(!t.ws.ctx.teams_dir.join("foo.lock").exists());

    let (team, _) = join_team(&t.ws, "foo", "w1", "worker").unwrap();
    assert!(team.is_member("w1"));
}

#[test]
fn test_get_missing_team() {
    let t = test_workspace();
    let err = get_team(&t.ws, "ghost").unwrap_err();
    assert!(matches!(err, CrewError::NotFound(_)));
}

#[test]
fn test_list_teams_sorted() {
    let t = test_workspace();
    assert!(list_teams(&t.ws).unwrap().is_empty());

    create_test_team(&t.ws, "zeta", "z", &[]);
    create_test_team(&t.ws, "alpha", "a", &[]);

    let names: Vec<String> = list_teams(&t.ws).unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[test]
fn test_join_is_idempotent_for_same_role() {
    let t = test_workspace();
    create_test_team(&t.ws, "alpha", "lead", &[]);

    let (_, events) = join_team(&t.ws, "alpha", "w1", "worker").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::MemberJoined);

    let (team, events) = join_team(&t.ws, "alpha", "w1", "worker").unwrap();
    assert!(events.is_empty());
    assert_eq!(team.members.len(), 2);

    let err = join_team(&t.ws, "alpha", "w1", "reviewer").unwrap_err();
    assert!(matches!(err, CrewError::Conflict(_)));
}

#[test]
fn test_join_requires_defined_role() {
    let t = test_workspace();
    create_team(
        &t.ws,
        NewTeam {
            name: "alpha".to_string(),
            leader: "lead".to_string(),
            topology: None,
            roles: Some(roles()),
        },
    )
    .unwrap();

    assert!(join_team(&t.ws, "alpha", "w1", "worker").is_ok());
    let err = join_team(&t.ws, "alpha", "w2", "astronaut").unwrap_err();
    assert!(matches!(err, CrewError::NotFound(_)));
}

#[test]
fn test_join_missing_team() {
    let t = test_workspace();
    let err = join_team(&t.ws, "ghost", "w1", "worker").unwrap_err();
    assert!(matches!(err, CrewError::NotFound(_)));
}

#[test]
fn test_leave_team() {
    let t = test_workspace();
    create_test_team(&t.ws, "alpha", "lead", &[("w1", "worker")]);

    let (team, events) = leave_team(&t.ws, "alpha", "w1").unwrap();
    assert!(!team.is_member("w1"));
    assert_eq!(events[0].event_type, EventType::MemberLeft);

    let err = leave_team(&t.ws, "alpha", "w1").unwrap_err();
    assert!(matches!(err, CrewError::NotFound(_)));

    let err = leave_team(&t.ws, "alpha", "lead").unwrap_err();
    assert!(matches!(err, CrewError::Conflict(_)));
}

#[test]
fn test_delete_team_removes_child_state() {
    let t = test_workspace();
    create_test_team(&t.ws, "alpha", "lead", &[("w1", "worker")]);
    let tasks_dir = t.ws.ctx.tasks_dir("alpha");
    std::fs::create_dir_all(&tasks_dir).unwrap();
    std::fs::write(tasks_dir.join("task-9.json"), "{}").unwrap();

    delete_team(&t.ws, "alpha").unwrap();

    assert!(!t.ws.ctx.team_dir("alpha").exists());
    assert!(list_teams(&t.ws).unwrap().is_empty());
    assert!(matches!(
        delete_team(&t.ws, "alpha").unwrap_err(),
        CrewError::NotFound(_)
    ));
}

#[test]
fn test_delete_then_recreate() {
    let t = test_workspace();
    create_test_team(&t.ws, "alpha", "lead", &[]);
    delete_team(&t.ws, "alpha").unwrap();

    let team = create_test_team(&t.ws, "alpha", "new-lead", &[]);
    assert_eq!(team.leader, "new-lead");
}

#[test]
fn test_permissions_without_roles_allow_members() {
    let t = test_workspace();
    let team = create_test_team(&t.ws, "alpha", "lead", &[("w1", "worker")]);

    assert!(check_permission(&team, "lead", Permission::DeleteTeam).is_ok());
    assert!(check_permission(&team, "w1", Permission::ManageRules).is_ok());

    let err = check_permission(&team, "stranger", Permission::ManageRules).unwrap_err();
    assert!(matches!(err, CrewError::PermissionDenied(_)));
}

#[test]
fn test_permissions_with_roles() {
    let t = test_workspace();
    create_team(
        &t.ws,
        NewTeam {
            name: "alpha".to_string(),
            leader: "lead".to_string(),
            topology: None,
            roles: Some(roles()),
        },
    )
    .unwrap();
    join_team(&t.ws, "alpha", "coord", "coordinator").unwrap();
    let (team, _) = join_team(&t.ws, "alpha", "w1", "worker").unwrap();

    assert!(check_permission(&team, "lead", Permission::DeleteTeam).is_ok());
    assert!(check_permission(&team, "coord", Permission::ManageRules).is_ok());
    assert!(matches!(
        check_permission(&team, "coord", Permission::DeleteTeam).unwrap_err(),
        CrewError::PermissionDenied(_)
    ));
    assert!(matches!(
        check_permission(&team, "w1", Permission::ManageRules).unwrap_err(),
        CrewError::PermissionDenied(_)
    ));
}

#[test]
fn test_malformed_team_config_is_validation_error() {
    let t = test_workspace();
    create_test_team(&t.ws, "alpha", "lead", &[]);
    std::fs::write(
        t.ws.ctx.team_config_path("alpha"),
        r#"{"name": "alpha", "leader": "ghost", "members": [], "created_at": "2026-01-15T09:00:00Z"}"#,
    )
    .unwrap();

    let err = get_team(&t.ws, "alpha").unwrap_err();
    match err {
        CrewError::Validation { message, .. } => assert!(message.contains("leader")),
        other => panic!("expected validation error, got {other:?}"),
    }
}
