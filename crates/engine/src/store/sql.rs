//! `sea-orm` backed store.
//!
//! Writes go straight to the database; after a commit the affected topic is
//! published on the [`ChangeFeed`] so live queries re-read. Several
//! `SqlStore`s sharing one database and one feed behave like several clients
//! of the same remote store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, future, stream};
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseConnection, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*, sea_query::Expr,
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::{
    Category, CategoryId, EngineError, Invitation, InvitationId, InvitationStatus,
    NewInvitation, ResultEngine, Team, TeamId, Transaction, TransactionFields, TransactionId,
    UserId, WorkspaceId, categories,
    invitations::{self, normalize_email},
    team_members, teams, transactions,
};

use super::{AtomicOp, ChangeFeed, SnapshotStream, Store, Topic};

#[derive(Clone, Debug)]
pub struct SqlStore {
    database: DatabaseConnection,
    changes: ChangeFeed,
}

impl SqlStore {
    /// A store with its own change feed.
    pub fn new(database: DatabaseConnection) -> Self {
        Self::with_change_feed(database, ChangeFeed::new())
    }

    /// A store sharing `changes` with other handles on the same database.
    pub fn with_change_feed(database: DatabaseConnection, changes: ChangeFeed) -> Self {
        Self { database, changes }
    }

    pub fn change_feed(&self) -> &ChangeFeed {
        &self.changes
    }

    /// Builds a live query: subscribe first, then read, so no commit between
    /// the two is missed.
    async fn live<T, F, Fut>(&self, topic: Topic, read: F) -> ResultEngine<SnapshotStream<T>>
    where
        T: Send + 'static,
        F: Fn(DatabaseConnection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResultEngine<Vec<T>>> + Send + 'static,
    {
        let changes = BroadcastStream::new(self.changes.subscribe(&topic));
        let initial = read(self.database.clone()).await?;
        debug!(?topic, rows = initial.len(), "live query started");

        let database = self.database.clone();
        let updates = changes.then(move |_| read(database.clone()));
        Ok(Box::pin(
            stream::once(future::ready(Ok(initial))).chain(updates),
        ))
    }
}

fn not_found(what: &str, id: &impl std::fmt::Display) -> EngineError {
    EngineError::NotFound(format!("{what} {id}"))
}

async fn load_teams<C: ConnectionTrait>(db: &C, ids: Vec<String>) -> ResultEngine<Vec<Team>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = teams::Entity::find()
        .filter(teams::Column::Id.is_in(ids.clone()))
        .order_by_asc(teams::Column::Name)
        .order_by_asc(teams::Column::Id)
        .all(db)
        .await?;
    let members = team_members::Entity::find()
        .filter(team_members::Column::TeamId.is_in(ids))
        .all(db)
        .await?;

    let mut by_team: HashMap<String, Vec<UserId>> = HashMap::new();
    for member in members {
        by_team
            .entry(member.team_id)
            .or_default()
            .push(UserId::new(member.user_id));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let members = by_team.remove(&row.id).unwrap_or_default();
            Team::from_parts(row, members)
        })
        .collect())
}

async fn pending_invitations(
    db: DatabaseConnection,
    to_email: String,
) -> ResultEngine<Vec<Invitation>> {
    invitations::Entity::find()
        .filter(invitations::Column::ToEmail.eq(to_email))
        .filter(invitations::Column::Status.eq(InvitationStatus::Pending.as_str()))
        .order_by_asc(invitations::Column::CreatedAt)
        .order_by_asc(invitations::Column::Id)
        .all(&db)
        .await?
        .into_iter()
        .map(Invitation::try_from)
        .collect()
}

async fn workspace_transactions(
    db: DatabaseConnection,
    workspace_id: WorkspaceId,
) -> ResultEngine<Vec<Transaction>> {
    Ok(transactions::Entity::find()
        .filter(transactions::Column::WorkspaceId.eq(workspace_id.to_string()))
        .order_by_asc(transactions::Column::CreatedAt)
        .order_by_asc(transactions::Column::Id)
        .all(&db)
        .await?
        .into_iter()
        .map(Transaction::from)
        .collect())
}

#[async_trait]
impl Store for SqlStore {
    async fn insert_team(&self, name: &str, owner_id: &UserId) -> ResultEngine<Team> {
        let id = TeamId::generate();
        let db_tx = self.database.begin().await?;
        teams::Entity::insert(teams::ActiveModel {
            id: ActiveValue::Set(id.to_string()),
            name: ActiveValue::Set(name.to_string()),
            owner_id: ActiveValue::Set(owner_id.to_string()),
            created_at: ActiveValue::Set(Utc::now()),
        })
        .exec_without_returning(&db_tx)
        .await?;
        team_members::Entity::insert(team_members::ActiveModel {
            team_id: ActiveValue::Set(id.to_string()),
            user_id: ActiveValue::Set(owner_id.to_string()),
        })
        .exec_without_returning(&db_tx)
        .await?;
        db_tx.commit().await?;

        self.get_team(&id).await
    }

    async fn get_team(&self, id: &TeamId) -> ResultEngine<Team> {
        load_teams(&self.database, vec![id.to_string()])
            .await?
            .pop()
            .ok_or_else(|| not_found("team", id))
    }

    async fn teams_with_member(&self, user_id: &UserId) -> ResultEngine<Vec<Team>> {
        let ids = team_members::Entity::find()
            .filter(team_members::Column::UserId.eq(user_id.to_string()))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|m| m.team_id)
            .collect();
        load_teams(&self.database, ids).await
    }

    async fn insert_invitation(&self, invitation: NewInvitation) -> ResultEngine<Invitation> {
        let id = InvitationId::generate();
        let to_email = normalize_email(&invitation.to_email);
        invitations::Entity::insert(invitations::ActiveModel {
            id: ActiveValue::Set(id.to_string()),
            from_email: ActiveValue::Set(invitation.from_email.clone()),
            to_email: ActiveValue::Set(to_email.clone()),
            team_id: ActiveValue::Set(invitation.team_id.to_string()),
            team_name: ActiveValue::Set(invitation.team_name.clone()),
            status: ActiveValue::Set(InvitationStatus::Pending.as_str().to_string()),
            created_at: ActiveValue::Set(Utc::now()),
        })
        .exec_without_returning(&self.database)
        .await?;

        self.changes.publish(&Topic::Invitations(to_email.clone()));

        Ok(Invitation {
            id,
            from_email: invitation.from_email,
            to_email,
            team_id: invitation.team_id,
            team_name: invitation.team_name,
            status: InvitationStatus::Pending,
        })
    }

    async fn get_invitation(&self, id: &InvitationId) -> ResultEngine<Invitation> {
        invitations::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| not_found("invitation", id))?
            .try_into()
    }

    async fn subscribe_invitations(
        &self,
        to_email: &str,
    ) -> ResultEngine<SnapshotStream<Invitation>> {
        let email = normalize_email(to_email);
        self.live(Topic::Invitations(email.clone()), move |db| {
            pending_invitations(db, email.clone())
        })
        .await
    }

    async fn run_atomic(&self, ops: Vec<AtomicOp>) -> ResultEngine<()> {
        let db_tx = self.database.begin().await?;
        let mut touched = Vec::new();

        // Any early return drops `db_tx`, which rolls everything back.
        for op in ops {
            match op {
                AtomicOp::TransitionInvitation { id, from, to } => {
                    from.ensure_transition(to)?;
                    // Write first: the conditional UPDATE takes the write lock,
                    // so a concurrent commit on the same row cannot interleave.
                    let result = invitations::Entity::update_many()
                        .col_expr(invitations::Column::Status, Expr::value(to.as_str()))
                        .filter(invitations::Column::Id.eq(id.to_string()))
                        .filter(invitations::Column::Status.eq(from.as_str()))
                        .exec(&db_tx)
                        .await?;
                    let row = invitations::Entity::find_by_id(id.to_string())
                        .one(&db_tx)
                        .await?
                        .ok_or_else(|| not_found("invitation", &id))?;
                    if result.rows_affected == 0 {
                        return Err(EngineError::InvalidState(format!(
                            "invitation {id} is already {}",
                            row.status
                        )));
                    }
                    touched.push(Topic::Invitations(normalize_email(&row.to_email)));
                }
                AtomicOp::AddTeamMember { team_id, user_id } => {
                    teams::Entity::find_by_id(team_id.to_string())
                        .one(&db_tx)
                        .await?
                        .ok_or_else(|| not_found("team", &team_id))?;
                    let existing = team_members::Entity::find_by_id((
                        team_id.to_string(),
                        user_id.to_string(),
                    ))
                    .one(&db_tx)
                    .await?;
                    if existing.is_none() {
                        team_members::Entity::insert(team_members::ActiveModel {
                            team_id: ActiveValue::Set(team_id.to_string()),
                            user_id: ActiveValue::Set(user_id.to_string()),
                        })
                        .exec_without_returning(&db_tx)
                        .await?;
                    }
                }
            }
        }

        db_tx.commit().await?;
        for topic in &touched {
            self.changes.publish(topic);
        }
        Ok(())
    }

    async fn insert_transaction(
        &self,
        workspace_id: &WorkspaceId,
        fields: &TransactionFields,
        recorded_by: &str,
    ) -> ResultEngine<TransactionId> {
        let id = TransactionId::generate();
        transactions::Entity::insert(transactions::ActiveModel::new_record(
            &id,
            workspace_id,
            fields,
            recorded_by,
            Utc::now(),
        ))
        .exec_without_returning(&self.database)
        .await?;

        self.changes
            .publish(&Topic::Transactions(workspace_id.clone()));
        Ok(id)
    }

    async fn update_transaction(
        &self,
        workspace_id: &WorkspaceId,
        id: &TransactionId,
        fields: &TransactionFields,
    ) -> ResultEngine<()> {
        let result = transactions::Entity::update_many()
            .col_expr(
                transactions::Column::AmountMinor,
                Expr::value(fields.amount.cents()),
            )
            .col_expr(
                transactions::Column::Category,
                Expr::value(fields.category.clone()),
            )
            .col_expr(transactions::Column::Note, Expr::value(fields.note.clone()))
            .col_expr(transactions::Column::IsIncome, Expr::value(fields.is_income))
            .col_expr(
                transactions::Column::OccurredAt,
                Expr::value(fields.occurred_at),
            )
            .filter(transactions::Column::Id.eq(id.to_string()))
            .filter(transactions::Column::WorkspaceId.eq(workspace_id.to_string()))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(not_found("transaction", id));
        }

        self.changes
            .publish(&Topic::Transactions(workspace_id.clone()));
        Ok(())
    }

    async fn delete_transaction(
        &self,
        workspace_id: &WorkspaceId,
        id: &TransactionId,
    ) -> ResultEngine<()> {
        let result = transactions::Entity::delete_many()
            .filter(transactions::Column::Id.eq(id.to_string()))
            .filter(transactions::Column::WorkspaceId.eq(workspace_id.to_string()))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(not_found("transaction", id));
        }

        self.changes
            .publish(&Topic::Transactions(workspace_id.clone()));
        Ok(())
    }

    async fn subscribe_transactions(
        &self,
        workspace_id: &WorkspaceId,
    ) -> ResultEngine<SnapshotStream<Transaction>> {
        let workspace = workspace_id.clone();
        self.live(Topic::Transactions(workspace_id.clone()), move |db| {
            workspace_transactions(db, workspace.clone())
        })
        .await
    }

    async fn insert_category(
        &self,
        workspace_id: &WorkspaceId,
        name: &str,
        is_income: bool,
    ) -> ResultEngine<Category> {
        let id = CategoryId::generate();
        categories::Entity::insert(categories::ActiveModel {
            id: ActiveValue::Set(id.to_string()),
            workspace_id: ActiveValue::Set(workspace_id.to_string()),
            name: ActiveValue::Set(name.to_string()),
            is_income: ActiveValue::Set(is_income),
        })
        .exec_without_returning(&self.database)
        .await?;

        Ok(Category {
            id,
            name: name.to_string(),
            is_income,
        })
    }

    async fn categories(
        &self,
        workspace_id: &WorkspaceId,
        is_income: bool,
    ) -> ResultEngine<Vec<Category>> {
        Ok(categories::Entity::find()
            .filter(categories::Column::WorkspaceId.eq(workspace_id.to_string()))
            .filter(categories::Column::IsIncome.eq(is_income))
            .order_by_asc(categories::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Category::from)
            .collect())
    }

    async fn delete_category(
        &self,
        workspace_id: &WorkspaceId,
        id: &CategoryId,
    ) -> ResultEngine<()> {
        let result = categories::Entity::delete_many()
            .filter(categories::Column::Id.eq(id.to_string()))
            .filter(categories::Column::WorkspaceId.eq(workspace_id.to_string()))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(not_found("category", id));
        }
        Ok(())
    }
}
