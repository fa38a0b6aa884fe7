//! The remote document store as seen by the engine.
//!
//! The engine never designs storage; it relies on a collaborator that offers
//! durable writes, filtered reads, an all-or-nothing commit for a short list
//! of conditional writes, and live full-snapshot subscriptions.
//!
//! Implementations:
//! - [`SqlStore`]: `sea-orm` over SQLite with an in-process change feed.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{
    Category, CategoryId, Invitation, InvitationId, InvitationStatus, NewInvitation,
    ResultEngine, Team, TeamId, Transaction, TransactionFields, TransactionId, UserId,
    WorkspaceId,
};

mod changes;
#[cfg(test)]
mod flaky;
mod sql;

pub use changes::{ChangeFeed, Topic};
#[cfg(test)]
pub(crate) use flaky::FlakyStore;
pub use sql::SqlStore;

/// Live view of a query: every item is the complete current result set.
///
/// The first item is delivered right after subscribing. An `Err` item reports
/// a failed re-read without ending the stream. Dropping the stream cancels
/// the subscription.
pub type SnapshotStream<T> = Pin<Box<dyn Stream<Item = ResultEngine<Vec<T>>> + Send>>;

/// One step of an atomic commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AtomicOp {
    /// Conditional write: moves the invitation to `to` only if it is
    /// currently `from`. Fails the whole commit with `InvalidState` otherwise.
    TransitionInvitation {
        id: InvitationId,
        from: InvitationStatus,
        to: InvitationStatus,
    },
    /// Set-union insert of a member; adding a present member is a no-op.
    AddTeamMember { team_id: TeamId, user_id: UserId },
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Creates a team whose only member is its owner.
    async fn insert_team(&self, name: &str, owner_id: &UserId) -> ResultEngine<Team>;

    async fn get_team(&self, id: &TeamId) -> ResultEngine<Team>;

    /// Every team whose member set contains `user_id`.
    async fn teams_with_member(&self, user_id: &UserId) -> ResultEngine<Vec<Team>>;

    async fn insert_invitation(&self, invitation: NewInvitation) -> ResultEngine<Invitation>;

    async fn get_invitation(&self, id: &InvitationId) -> ResultEngine<Invitation>;

    /// Live pending invitations addressed to `to_email`, oldest first.
    async fn subscribe_invitations(&self, to_email: &str)
    -> ResultEngine<SnapshotStream<Invitation>>;

    /// Commits all ops or none of them.
    async fn run_atomic(&self, ops: Vec<AtomicOp>) -> ResultEngine<()>;

    async fn insert_transaction(
        &self,
        workspace_id: &WorkspaceId,
        fields: &TransactionFields,
        recorded_by: &str,
    ) -> ResultEngine<TransactionId>;

    async fn update_transaction(
        &self,
        workspace_id: &WorkspaceId,
        id: &TransactionId,
        fields: &TransactionFields,
    ) -> ResultEngine<()>;

    async fn delete_transaction(
        &self,
        workspace_id: &WorkspaceId,
        id: &TransactionId,
    ) -> ResultEngine<()>;

    /// Live transaction collection of a workspace, in insertion order.
    async fn subscribe_transactions(
        &self,
        workspace_id: &WorkspaceId,
    ) -> ResultEngine<SnapshotStream<Transaction>>;

    async fn insert_category(
        &self,
        workspace_id: &WorkspaceId,
        name: &str,
        is_income: bool,
    ) -> ResultEngine<Category>;

    async fn categories(
        &self,
        workspace_id: &WorkspaceId,
        is_income: bool,
    ) -> ResultEngine<Vec<Category>>;

    async fn delete_category(&self, workspace_id: &WorkspaceId, id: &CategoryId)
    -> ResultEngine<()>;
}
