//! Live transaction snapshot of the active workspace.
//!
//! At most one store subscription is alive at any time. Switching workspace
//! aborts the previous subscription task before the next one is spawned, and
//! every published frame is tagged with the generation of the subscription
//! that produced it: a frame from an aborted task that raced the switch is
//! discarded under the watch lock, so a previous workspace never leaks into
//! the current snapshot.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use futures::StreamExt;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, warn};

use crate::{Transaction, WorkspaceId, store::Store};

/// Resubscribe policy for dropped live streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// The full transaction collection of one workspace, replaced on every
/// change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionSnapshot {
    pub workspace: Option<WorkspaceId>,
    pub transactions: Arc<Vec<Transaction>>,
    /// False until the first result set of `workspace` arrived.
    pub loaded: bool,
    generation: u64,
}

#[derive(Debug)]
struct ActiveSubscription {
    workspace: WorkspaceId,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct SyncState {
    active: Option<ActiveSubscription>,
    generation: u64,
    started: u64,
}

#[derive(Clone)]
pub struct TransactionSync {
    store: Arc<dyn Store>,
    options: SyncOptions,
    snapshot: Arc<watch::Sender<TransactionSnapshot>>,
    state: Arc<Mutex<SyncState>>,
}

impl TransactionSync {
    pub fn new(store: Arc<dyn Store>, options: SyncOptions) -> Self {
        let (snapshot, _) = watch::channel(TransactionSnapshot::default());
        Self {
            store,
            options,
            snapshot: Arc::new(snapshot),
            state: Arc::new(Mutex::new(SyncState::default())),
        }
    }

    /// Points the engine at `workspace`, or at nothing.
    ///
    /// Re-activating the current workspace is a no-op and returns `false`.
    /// Must be called from within a tokio runtime.
    pub fn activate(&self, workspace: Option<WorkspaceId>) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let current = state.active.as_ref().map(|a| &a.workspace);
        if current == workspace.as_ref() {
            return false;
        }

        if let Some(previous) = state.active.take() {
            previous.handle.abort();
            debug!(workspace = %previous.workspace, "transaction subscription cancelled");
        }

        state.generation += 1;
        let generation = state.generation;
        self.snapshot.send_replace(TransactionSnapshot {
            workspace: workspace.clone(),
            transactions: Arc::new(Vec::new()),
            loaded: false,
            generation,
        });

        if let Some(workspace) = workspace {
            state.started += 1;
            let handle = tokio::spawn(run_subscription(
                self.store.clone(),
                workspace.clone(),
                generation,
                self.snapshot.clone(),
                self.options,
            ));
            state.active = Some(ActiveSubscription { workspace, handle });
        }
        true
    }

    pub fn deactivate(&self) -> bool {
        self.activate(None)
    }

    pub fn active_workspace(&self) -> Option<WorkspaceId> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .as_ref()
            .map(|a| a.workspace.clone())
    }

    /// Number of subscription lifecycles started so far.
    pub fn subscriptions_started(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .started
    }

    pub fn snapshot(&self) -> TransactionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionSnapshot> {
        self.snapshot.subscribe()
    }
}

impl std::fmt::Debug for TransactionSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSync")
            .field("options", &self.options)
            .field("active", &self.active_workspace())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Publish {
    Replaced,
    Unchanged,
    Stale,
}

/// Replaces the snapshot if `generation` is still the current one.
fn publish(
    snapshot: &watch::Sender<TransactionSnapshot>,
    generation: u64,
    transactions: Vec<Transaction>,
) -> Publish {
    let mut outcome = Publish::Unchanged;
    snapshot.send_if_modified(|current| {
        if current.generation != generation {
            outcome = Publish::Stale;
            return false;
        }
        if current.loaded && *current.transactions == transactions {
            return false;
        }
        current.transactions = Arc::new(transactions);
        current.loaded = true;
        outcome = Publish::Replaced;
        true
    });
    outcome
}

async fn run_subscription(
    store: Arc<dyn Store>,
    workspace: WorkspaceId,
    generation: u64,
    snapshot: Arc<watch::Sender<TransactionSnapshot>>,
    options: SyncOptions,
) {
    let mut backoff = options.initial_backoff;

    loop {
        match store.subscribe_transactions(&workspace).await {
            Ok(mut frames) => {
                debug!(%workspace, generation, "transaction subscription established");
                while let Some(frame) = frames.next().await {
                    match frame {
                        Ok(transactions) => {
                            backoff = options.initial_backoff;
                            if publish(&snapshot, generation, transactions) == Publish::Stale {
                                return;
                            }
                        }
                        Err(err) => {
                            warn!(%workspace, %err, "snapshot refresh failed, keeping last snapshot");
                        }
                    }
                }
                warn!(%workspace, "transaction stream ended");
            }
            Err(err) => {
                error!(%workspace, %err, "transaction subscription failed");
            }
        }

        if snapshot.borrow().generation != generation {
            return;
        }
        debug!(%workspace, ?backoff, "resubscribing to transactions");
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(options.max_backoff);
    }
}
