//! Teams: shared workspaces.
//!
//! A team row carries the name and owner; membership lives in
//! `team_members` so that adding a member is a set-union insert rather than a
//! read-modify-write of a list.

use std::collections::BTreeSet;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, TeamId, UserId, WorkspaceId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub owner_id: UserId,
    /// Always contains `owner_id`.
    pub members: BTreeSet<UserId>,
}

impl Team {
    pub fn workspace_id(&self) -> WorkspaceId {
        WorkspaceId::from(&self.id)
    }

    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    pub(crate) fn from_parts(model: Model, members: impl IntoIterator<Item = UserId>) -> Self {
        let owner_id = UserId::new(model.owner_id);
        let mut members: BTreeSet<UserId> = members.into_iter().collect();
        members.insert(owner_id.clone());
        Self {
            id: TeamId::new(model.id),
            name: model.name,
            owner_id,
            members,
        }
    }
}

/// Trimmed team name, rejected when empty.
pub(crate) fn normalize_team_name(name: &str) -> ResultEngine<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(
            "team name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "teams")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::team_members::Entity")]
    Members,
}

impl Related<super::team_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn model() -> Model {
        Model {
            id: "t1".to_string(),
            name: "Household".to_string(),
            owner_id: "owner".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn owner_is_always_a_member() {
        let team = Team::from_parts(model(), Vec::new());
        assert!(team.has_member(&UserId::new("owner")));
        assert_eq!(team.members.len(), 1);
    }

    #[test]
    fn members_are_deduplicated() {
        let team = Team::from_parts(
            model(),
            vec![UserId::new("owner"), UserId::new("bob"), UserId::new("bob")],
        );
        assert_eq!(team.members.len(), 2);
        assert_eq!(team.workspace_id(), WorkspaceId::new("t1"));
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(matches!(
            normalize_team_name("   "),
            Err(EngineError::Validation(_))
        ));
        assert_eq!(normalize_team_name(" Trip ").unwrap(), "Trip");
    }
}
