//! In-memory store whose live queries drop out.
//!
//! The first subscription of each kind delivers the seeded rows once, then a
//! failed re-read, then ends. Every later subscription only fails. Writes and
//! plain reads report the store as unavailable.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;

use crate::{
    Category, CategoryId, EngineError, Invitation, InvitationId, NewInvitation, ResultEngine,
    Team, TeamId, Transaction, TransactionFields, TransactionId, UserId, WorkspaceId,
};

use super::{AtomicOp, SnapshotStream, Store};

#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    transactions: Vec<Transaction>,
    invitations: Vec<Invitation>,
    transaction_subscriptions: AtomicUsize,
    invitation_subscriptions: AtomicUsize,
}

impl FlakyStore {
    pub(crate) fn new(transactions: Vec<Transaction>, invitations: Vec<Invitation>) -> Self {
        Self {
            transactions,
            invitations,
            ..Self::default()
        }
    }

    pub(crate) fn transaction_subscriptions(&self) -> usize {
        self.transaction_subscriptions.load(Ordering::SeqCst)
    }

    pub(crate) fn invitation_subscriptions(&self) -> usize {
        self.invitation_subscriptions.load(Ordering::SeqCst)
    }
}

fn offline<T>() -> ResultEngine<T> {
    Err(EngineError::RemoteUnavailable("offline".to_string()))
}

fn dropping_stream<T: Clone + Send + 'static>(
    seen_before: usize,
    rows: &[T],
) -> SnapshotStream<T> {
    let mut frames = Vec::new();
    if seen_before == 0 {
        frames.push(Ok(rows.to_vec()));
    }
    frames.push(offline());
    Box::pin(stream::iter(frames))
}

#[async_trait]
impl Store for FlakyStore {
    async fn insert_team(&self, _name: &str, _owner_id: &UserId) -> ResultEngine<Team> {
        offline()
    }

    async fn get_team(&self, _id: &TeamId) -> ResultEngine<Team> {
        offline()
    }

    async fn teams_with_member(&self, _user_id: &UserId) -> ResultEngine<Vec<Team>> {
        offline()
    }

    async fn insert_invitation(&self, _invitation: NewInvitation) -> ResultEngine<Invitation> {
        offline()
    }

    async fn get_invitation(&self, _id: &InvitationId) -> ResultEngine<Invitation> {
        offline()
    }

    async fn subscribe_invitations(
        &self,
        _to_email: &str,
    ) -> ResultEngine<SnapshotStream<Invitation>> {
        let seen = self.invitation_subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(dropping_stream(seen, &self.invitations))
    }

    async fn run_atomic(&self, _ops: Vec<AtomicOp>) -> ResultEngine<()> {
        offline()
    }

    async fn insert_transaction(
        &self,
        _workspace_id: &WorkspaceId,
        _fields: &TransactionFields,
        _recorded_by: &str,
    ) -> ResultEngine<TransactionId> {
        offline()
    }

    async fn update_transaction(
        &self,
        _workspace_id: &WorkspaceId,
        _id: &TransactionId,
        _fields: &TransactionFields,
    ) -> ResultEngine<()> {
        offline()
    }

    async fn delete_transaction(
        &self,
        _workspace_id: &WorkspaceId,
        _id: &TransactionId,
    ) -> ResultEngine<()> {
        offline()
    }

    async fn subscribe_transactions(
        &self,
        _workspace_id: &WorkspaceId,
    ) -> ResultEngine<SnapshotStream<Transaction>> {
        let seen = self.transaction_subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(dropping_stream(seen, &self.transactions))
    }

    async fn insert_category(
        &self,
        _workspace_id: &WorkspaceId,
        _name: &str,
        _is_income: bool,
    ) -> ResultEngine<Category> {
        offline()
    }

    async fn categories(
        &self,
        _workspace_id: &WorkspaceId,
        _is_income: bool,
    ) -> ResultEngine<Vec<Category>> {
        offline()
    }

    async fn delete_category(
        &self,
        _workspace_id: &WorkspaceId,
        _id: &CategoryId,
    ) -> ResultEngine<()> {
        offline()
    }
}
