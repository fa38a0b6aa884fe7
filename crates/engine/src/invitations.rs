//! Invitations to join a team.
//!
//! Status only moves forward: `pending -> accepted | rejected`, and both
//! targets are terminal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, InvitationId, ResultEngine, TeamId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Checks that `self -> next` is a legal move.
    pub fn ensure_transition(self, next: InvitationStatus) -> ResultEngine<()> {
        match (self, next) {
            (Self::Pending, Self::Accepted | Self::Rejected) => Ok(()),
            (from, to) => Err(EngineError::InvalidState(format!(
                "invitation cannot move from {} to {}",
                from.as_str(),
                to.as_str()
            ))),
        }
    }
}

impl TryFrom<&str> for InvitationStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(EngineError::RemoteUnavailable(format!(
                "invalid invitation status in store: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub from_email: String,
    pub to_email: String,
    pub team_id: TeamId,
    pub team_name: String,
    pub status: InvitationStatus,
}

/// Fields of an invitation before the store assigns an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewInvitation {
    pub from_email: String,
    pub to_email: String,
    pub team_id: TeamId,
    pub team_name: String,
}

/// Canonical form of an address: trimmed, ASCII lowercase. Stored invitee
/// addresses, inbox queries and the addressee check all go through it.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl NewInvitation {
    /// Validates and trims the addressing fields; the invitee address is
    /// stored lowercase.
    pub fn new(
        from_email: &str,
        to_email: &str,
        team_id: TeamId,
        team_name: &str,
    ) -> ResultEngine<Self> {
        let to_email = normalize_email(to_email);
        if to_email.is_empty() {
            return Err(EngineError::Validation(
                "invitee email must not be empty".to_string(),
            ));
        }
        if team_id.as_str().trim().is_empty() {
            return Err(EngineError::Validation(
                "team id must not be empty".to_string(),
            ));
        }
        Ok(Self {
            from_email: from_email.trim().to_string(),
            to_email,
            team_id,
            team_name: team_name.trim().to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "invitations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub from_email: String,
    pub to_email: String,
    pub team_id: String,
    pub team_name: String,
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Invitation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: InvitationId::new(model.id),
            from_email: model.from_email,
            to_email: model.to_email,
            team_id: TeamId::new(model.team_id),
            team_name: model.team_name,
            status: InvitationStatus::try_from(model.status.as_str())?,
        })
    }
}
