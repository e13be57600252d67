//! Rule condition evaluation.

use super::model::{CompareOp, Condition, CountedResource};
use crate::error::Result;
use crate::events::DispatchEvent;
use crate::task;
use crate::team::TeamConfig;
use crate::workspace::Workspace;
use serde_json::Value;
use std::cmp::Ordering;

/// Whether `condition` holds for `event`. No condition always holds.
///
/// Resource counts are computed fresh on every call.
pub fn evaluate(
    ws: &Workspace,
    team: &TeamConfig,
    condition: Option<&Condition>,
    event: &DispatchEvent,
) -> Result<bool> {
    match condition {
        None => Ok(true),
        Some(Condition::FieldMatch { field, op, value }) => Ok(event
            .field(field)
            .is_some_and(|actual| compare(*op, actual, value))),
        Some(Condition::ResourceCount { resource, op, value }) => {
            let count = count(ws, team, *resource)?;
            Ok(compare(*op, &Value::from(count), &Value::from(*value)))
        }
    }
}

fn count(ws: &Workspace, team: &TeamConfig, resource: CountedResource) -> Result<i64> {
    let n = match resource {
        CountedResource::UnblockedPendingTasks => task::unblocked_pending(ws, &team.name)?.len(),
        CountedResource::NonLeaderMembers => team.non_leader_members().count(),
    };
    Ok(n as i64)
}

/// Compare `actual` against `expected`.
///
/// Numbers compare numerically and strings lexicographically. Other values
/// only support `eq` and `neq`; ordering across mismatched types is false.
pub fn compare(op: CompareOp, actual: &Value, expected: &Value) -> bool {
    let ordering = match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };

    match (op, ordering) {
        (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
        (CompareOp::Neq, Some(o)) => o != Ordering::Equal,
        (CompareOp::Eq, None) => actual == expected,
        (CompareOp::Neq, None) => actual != expected,
        (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
        (CompareOp::Lt, Some(o)) => o == Ordering::Less,
        (CompareOp::Gte, Some(o)) => o != Ordering::Less,
        (CompareOp::Lte, Some(o)) => o != Ordering::Greater,
        (_, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use crate::task::{TaskInput, TaskPatch};
    use crate::test_support::{create_test_team, test_workspace};
    use serde_json::json;

    #[test]
    fn test_compare_numbers() {
        assert!(compare(CompareOp::Eq, &json!(2), &json!(2.0)));
        assert!(compare(CompareOp::Gt, &json!(10), &json!(9)));
        assert!(compare(CompareOp::Gte, &json!(3), &json!(3)));
        assert!(compare(CompareOp::Lt, &json!(-1), &json!(0)));
        assert!(!compare(CompareOp::Lte, &json!(4), &json!(3)));
        assert!(compare(CompareOp::Neq, &json!(1), &json!(2)));
    }

    #[test]
    fn test_compare_strings_lexicographically() {
        assert!(compare(CompareOp::Eq, &json!("high"), &json!("high")));
        assert!(compare(CompareOp::Lt, &json!("apple"), &json!("banana")));
        // Lexicographic, not numeric.
        assert!(compare(CompareOp::Gt, &json!("9"), &json!("10")));
    }

    #[test]
    fn test_compare_mismatched_types() {
        assert!(!compare(CompareOp::Eq, &json!("1"), &json!(1)));
        assert!(compare(CompareOp::Neq, &json!("1"), &json!(1)));
        assert!(!compare(CompareOp::Gt, &json!("1"), &json!(0)));
        assert!(compare(CompareOp::Eq, &json!(true), &json!(true)));
        assert!(!compare(CompareOp::Gte, &json!(true), &json!(true)));
    }

    #[test]
    fn test_field_match() {
        let t = test_workspace();
        let team = create_test_team(&t.ws, "alpha", "lead", &[]);
        let event = t
            .ws
            .event(EventType::TaskClaimed, "alpha", json!({"owner": "w1", "task": {"priority": 2}}));

        let matches = |field: &str, op: CompareOp, value: Value| {
            let condition = Condition::FieldMatch {
                field: field.to_string(),
                op,
                value,
            };
            evaluate(&t.ws, &team, Some(&condition), &event).unwrap()
        };

        assert!(matches("owner", CompareOp::Eq, json!("w1")));
        assert!(!matches("owner", CompareOp::Eq, json!("w2")));
        assert!(matches("task.priority", CompareOp::Gte, json!(2)));
        // A missing field never matches, even for neq.
        assert!(!matches("missing", CompareOp::Neq, json!("anything")));
        assert!(evaluate(&t.ws, &team, None, &event).unwrap());
    }

    #[test]
    fn test_resource_counts_are_live() {
        let t = test_workspace();
        let team = create_test_team(&t.ws, "alpha", "lead", &[("w1", "worker"), ("w2", "worker")]);
        let event = t.ws.event(EventType::TaskCreated, "alpha", json!({}));
        let unblocked_at_least = |n: i64| {
            let condition = Condition::ResourceCount {
                resource: CountedResource::UnblockedPendingTasks,
                op: CompareOp::Gte,
                value: n,
            };
            evaluate(&t.ws, &team, Some(&condition), &event).unwrap()
        };

        assert!(!unblocked_at_least(1));
        let (a, _) = task::create(
            &t.ws,
            "alpha",
            TaskInput {
                title: "A".to_string(),
                ..TaskInput::default()
            },
        )
        .unwrap();
        assert!(unblocked_at_least(1));

        task::update(
            &t.ws,
            "alpha",
            &a.id,
            TaskPatch {
                status: Some(task::TaskStatus::InProgress),
                ..TaskPatch::default()
            },
        )
        .unwrap();
        assert!(!unblocked_at_least(1));

        let members = Condition::ResourceCount {
            resource: CountedResource::NonLeaderMembers,
            op: CompareOp::Eq,
            value: 2,
        };
        assert!(evaluate(&t.ws, &team, Some(&members), &event).unwrap());
    }
}
