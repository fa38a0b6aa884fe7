use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    Aggregation, EngineError, IdentityContext, InvitationEngine, MonthCursor, ResultEngine,
    SyncOptions, TeamDirectory, TotalsScope, TransactionSync, User, WorkspaceId,
    WorkspaceSelector,
    store::{SqlStore, Store},
};

mod categories;
mod invitations;
mod teams;
mod transactions;
mod views;
mod workspaces;

/// The wired engine: identity in, monthly view out.
///
/// Building spawns three background tasks: one follows the identity context,
/// one follows the workspace selector into the transaction sync engine, and
/// one recomputes the monthly view. Dropping the engine stops all of them.
pub struct Engine {
    store: Arc<dyn Store>,
    identity: IdentityContext,
    selector: WorkspaceSelector,
    teams: TeamDirectory,
    invitations: InvitationEngine,
    sync: TransactionSync,
    aggregation: Aggregation,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    pub fn selector(&self) -> &WorkspaceSelector {
        &self.selector
    }

    pub fn team_directory(&self) -> &TeamDirectory {
        &self.teams
    }

    pub fn invitation_engine(&self) -> &InvitationEngine {
        &self.invitations
    }

    pub fn transaction_sync(&self) -> &TransactionSync {
        &self.sync
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    fn require_user(&self) -> ResultEngine<User> {
        self.identity
            .current_user()
            .ok_or_else(|| EngineError::InvalidState("nobody is signed in".to_string()))
    }

    fn require_workspace(&self) -> ResultEngine<WorkspaceId> {
        self.selector
            .active_workspace()
            .ok_or_else(|| EngineError::InvalidState("no active workspace".to_string()))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.sync.deactivate();
        self.invitations.stop();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("identity", &self.identity)
            .field("selector", &self.selector)
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

/// Applies sign-in and sign-out transitions to the components.
///
/// Re-signing the same user never notifies, so every `Some` seen here is a
/// fresh sign-in, even when it equals the previous value: a sign-out and
/// sign-in in quick succession arrive as a single change.
async fn follow_identity(
    mut identity: watch::Receiver<Option<User>>,
    selector: WorkspaceSelector,
    teams: TeamDirectory,
    invitations: InvitationEngine,
    sync: TransactionSync,
) {
    while identity.changed().await.is_ok() {
        let user = identity.borrow_and_update().clone();
        match &user {
            Some(user) => {
                debug!(user = %user.id, "signed in");
                selector.reset_for(Some(user));
                invitations.watch_inbox(&user.email);
                if let Err(err) = teams.list_my_teams(&user.id).await {
                    warn!(%err, "team list refresh after sign-in failed");
                }
            }
            None => {
                debug!("signed out");
                selector.reset_for(None);
                sync.deactivate();
                invitations.stop();
                teams.clear();
            }
        }
    }
}

/// Keeps exactly one transaction subscription on the selected workspace.
async fn follow_workspace(
    mut selected: watch::Receiver<Option<WorkspaceId>>,
    sync: TransactionSync,
) {
    while selected.changed().await.is_ok() {
        let workspace = selected.borrow_and_update().clone();
        sync.activate(workspace);
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    store: Option<Arc<dyn Store>>,
    identity: Option<IdentityContext>,
    sync_options: SyncOptions,
    totals_scope: TotalsScope,
    month: Option<MonthCursor>,
}

impl EngineBuilder {
    /// Pass the required store
    pub fn store(mut self, store: Arc<dyn Store>) -> EngineBuilder {
        self.store = Some(store);
        self
    }

    /// Use a [`SqlStore`] over `db`
    pub fn database(self, db: DatabaseConnection) -> EngineBuilder {
        self.store(Arc::new(SqlStore::new(db)))
    }

    /// Share an identity context with the authentication layer
    pub fn identity(mut self, identity: IdentityContext) -> EngineBuilder {
        self.identity = Some(identity);
        self
    }

    pub fn sync_options(mut self, options: SyncOptions) -> EngineBuilder {
        self.sync_options = options;
        self
    }

    pub fn totals_scope(mut self, scope: TotalsScope) -> EngineBuilder {
        self.totals_scope = scope;
        self
    }

    /// Initial month cursor, the current month by default
    pub fn month(mut self, month: MonthCursor) -> EngineBuilder {
        self.month = Some(month);
        self
    }

    /// Construct `Engine`. Must be called from within a tokio runtime.
    pub async fn build(self) -> ResultEngine<Engine> {
        let store = self
            .store
            .ok_or_else(|| EngineError::Validation("a store is required".to_string()))?;
        let identity = self.identity.unwrap_or_default();

        let selector = WorkspaceSelector::new(identity.clone());
        let teams = TeamDirectory::new(store.clone(), identity.clone());
        let invitations = InvitationEngine::new(store.clone(), teams.clone(), self.sync_options);
        let sync = TransactionSync::new(store.clone(), self.sync_options);
        let aggregation = Aggregation::new(
            self.month.unwrap_or_else(MonthCursor::current),
            self.totals_scope,
        );

        // Mark the current values as seen before the followers start, so
        // they only react to later transitions.
        let mut identity_rx = identity.subscribe();
        let current_user = identity_rx.borrow_and_update().clone();
        selector.reset_for(current_user.as_ref());
        let mut selected_rx = selector.subscribe();
        let current_workspace = selected_rx.borrow_and_update().clone();

        if let Some(user) = &current_user {
            teams.list_my_teams(&user.id).await?;
            invitations.watch_inbox(&user.email);
        }
        sync.activate(current_workspace);

        let tasks = vec![
            tokio::spawn(follow_identity(
                identity_rx,
                selector.clone(),
                teams.clone(),
                invitations.clone(),
                sync.clone(),
            )),
            tokio::spawn(follow_workspace(selected_rx, sync.clone())),
            aggregation.spawn(sync.subscribe()),
        ];

        Ok(Engine {
            store,
            identity,
            selector,
            teams,
            invitations,
            sync,
            aggregation,
            tasks,
        })
    }
}
