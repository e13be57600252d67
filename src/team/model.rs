//! Team config document model.

use crate::dispatch::{DispatchLogEntry, DispatchRule};
use crate::store::{FieldError, Validate, require_non_empty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Role name given to the team creator.
pub const LEADER_ROLE: &str = "leader";

/// How members are expected to coordinate. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Flat,
    Hierarchical,
    Mesh,
    Pipeline,
}

impl std::str::FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(Topology::Flat),
            "hierarchical" => Ok(Topology::Hierarchical),
            "mesh" => Ok(Topology::Mesh),
            "pipeline" => Ok(Topology::Pipeline),
            other => Err(format!(
                "unknown topology '{}' (expected flat, hierarchical, mesh or pipeline)",
                other
            )),
        }
    }
}

/// Operations gated by role permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageRules,
    ManageAgents,
    DeleteTeam,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageRules => "manage_rules",
            Permission::ManageAgents => "manage_agents",
            Permission::DeleteTeam => "delete_team",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

/// The team config document (`teams/<team>/team.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    pub name: String,

    pub leader: String,

    pub members: Vec<Member>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<Topology>,

    /// Role definitions. When absent every member holds every permission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<BTreeMap<String, RoleDef>>,

    #[serde(default)]
    pub dispatch_rules: Vec<DispatchRule>,

    /// Bounded audit log, oldest first.
    #[serde(default)]
    pub dispatch_log: Vec<DispatchLogEntry>,

    pub created_at: DateTime<Utc>,
}

impl TeamConfig {
    pub fn member(&self, agent: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == agent)
    }

    pub fn is_member(&self, agent: &str) -> bool {
        self.member(agent).is_some()
    }

    /// Members other than the leader.
    pub fn non_leader_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.id != self.leader)
    }

    pub fn rule(&self, rule_id: &str) -> Option<&DispatchRule> {
        self.dispatch_rules.iter().find(|r| r.id == rule_id)
    }
}

impl Validate for TeamConfig {
    fn validate(&self) -> Result<(), FieldError> {
        require_non_empty("name", &self.name)?;
        require_non_empty("leader", &self.leader)?;

        let mut ids = HashSet::new();
        for (i, member) in self.members.iter().enumerate() {
            require_non_empty(&format!("members[{}].id", i), &member.id)?;
            if !ids.insert(member.id.as_str()) {
                return Err(FieldError::new(
                    format!("members[{}].id", i),
                    format!("duplicate member '{}'", member.id),
                ));
            }
        }
        if !ids.contains(self.leader.as_str()) {
            return Err(FieldError::new("leader", "leader must be a member of the team"));
        }

        let mut rule_ids = HashSet::new();
        for (i, rule) in self.dispatch_rules.iter().enumerate() {
            rule.validate()
                .map_err(|e| FieldError::new(format!("dispatch_rules[{}].{}", i, e.field), e.message))?;
            if !rule_ids.insert(rule.id.as_str()) {
                return Err(FieldError::new(
                    format!("dispatch_rules[{}].id", i),
                    format!("duplicate rule id '{}'", rule.id),
                ));
            }
        }

        self.dispatch_log
            .validate()
            .map_err(|e| FieldError::new(format!("dispatch_log{}", e.field), e.message))
    }
}
