//! Invitation engine: sending, the live inbox, accept and reject.

use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    EngineError, Invitation, InvitationStatus, NewInvitation, ResultEngine, SyncOptions,
    TeamDirectory, TeamId, User,
    invitations::normalize_email,
    store::{AtomicOp, Store},
};

/// Pending invitations addressed to one email, oldest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inbox {
    pub email: Option<String>,
    pub invitations: Vec<Invitation>,
    generation: u64,
}

#[derive(Debug, Default)]
struct Watcher {
    email: Option<String>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

#[derive(Clone)]
pub struct InvitationEngine {
    store: Arc<dyn Store>,
    teams: TeamDirectory,
    options: SyncOptions,
    inbox: Arc<watch::Sender<Inbox>>,
    watcher: Arc<Mutex<Watcher>>,
}

impl InvitationEngine {
    pub fn new(store: Arc<dyn Store>, teams: TeamDirectory, options: SyncOptions) -> Self {
        let (inbox, _) = watch::channel(Inbox::default());
        Self {
            store,
            teams,
            options,
            inbox: Arc::new(inbox),
            watcher: Arc::new(Mutex::new(Watcher::default())),
        }
    }

    /// Creates a pending invitation. Repeated invitations to the same
    /// address and team are all kept.
    pub async fn send_invite(
        &self,
        from_email: &str,
        to_email: &str,
        team_id: TeamId,
        team_name: &str,
    ) -> ResultEngine<Invitation> {
        let invitation = NewInvitation::new(from_email, to_email, team_id, team_name)?;
        let invitation = self.store.insert_invitation(invitation).await?;
        debug!(invitation = %invitation.id, to = %invitation.to_email, "invitation sent");
        Ok(invitation)
    }

    /// Keeps the inbox in sync with the pending invitations of `email`.
    /// Watching the current address again, in any letter case, is a no-op.
    pub fn watch_inbox(&self, email: &str) {
        let email = normalize_email(email);
        let email = email.as_str();
        let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if watcher.email.as_deref() == Some(email) {
            return;
        }
        if let Some(handle) = watcher.handle.take() {
            handle.abort();
        }

        watcher.generation += 1;
        watcher.email = Some(email.to_string());
        let generation = watcher.generation;
        self.inbox.send_replace(Inbox {
            email: Some(email.to_string()),
            invitations: Vec::new(),
            generation,
        });
        watcher.handle = Some(tokio::spawn(run_inbox(
            self.store.clone(),
            email.to_string(),
            generation,
            self.inbox.clone(),
            self.options,
        )));
    }

    /// Cancels the inbox subscription and empties the inbox.
    pub fn stop(&self) {
        let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = watcher.handle.take() {
            handle.abort();
        }
        watcher.email = None;
        watcher.generation += 1;
        self.inbox.send_replace(Inbox {
            generation: watcher.generation,
            ..Inbox::default()
        });
    }

    pub fn my_pending_invites(&self) -> Vec<Invitation> {
        self.inbox.borrow().invitations.clone()
    }

    pub fn subscribe_inbox(&self) -> watch::Receiver<Inbox> {
        self.inbox.subscribe()
    }

    /// Joins `user` to the invitation's team and closes the invitation in
    /// one atomic commit, then refreshes the user's team list.
    pub async fn accept(&self, invitation: &Invitation, user: &User) -> ResultEngine<()> {
        ensure_addressed_to(invitation, user)?;
        invitation.status.ensure_transition(InvitationStatus::Accepted)?;

        self.store
            .run_atomic(vec![
                AtomicOp::TransitionInvitation {
                    id: invitation.id.clone(),
                    from: InvitationStatus::Pending,
                    to: InvitationStatus::Accepted,
                },
                AtomicOp::AddTeamMember {
                    team_id: invitation.team_id.clone(),
                    user_id: user.id.clone(),
                },
            ])
            .await?;
        info!(
            invitation = %invitation.id,
            team = %invitation.team_id,
            user = %user.id,
            "invitation accepted"
        );

        self.teams.list_my_teams(&user.id).await?;
        Ok(())
    }

    pub async fn reject(&self, invitation: &Invitation, user: &User) -> ResultEngine<()> {
        ensure_addressed_to(invitation, user)?;
        invitation.status.ensure_transition(InvitationStatus::Rejected)?;

        self.store
            .run_atomic(vec![AtomicOp::TransitionInvitation {
                id: invitation.id.clone(),
                from: InvitationStatus::Pending,
                to: InvitationStatus::Rejected,
            }])
            .await?;
        info!(invitation = %invitation.id, "invitation rejected");
        Ok(())
    }
}

impl std::fmt::Debug for InvitationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvitationEngine")
            .field("options", &self.options)
            .field("inbox", &self.inbox.borrow().email)
            .finish_non_exhaustive()
    }
}

fn ensure_addressed_to(invitation: &Invitation, user: &User) -> ResultEngine<()> {
    if normalize_email(&invitation.to_email) == normalize_email(&user.email) {
        return Ok(());
    }
    Err(EngineError::Validation(format!(
        "invitation {} is not addressed to {}",
        invitation.id, user.email
    )))
}

async fn run_inbox(
    store: Arc<dyn Store>,
    email: String,
    generation: u64,
    inbox: Arc<watch::Sender<Inbox>>,
    options: SyncOptions,
) {
    let mut backoff = options.initial_backoff;

    loop {
        match store.subscribe_invitations(&email).await {
            Ok(mut frames) => {
                while let Some(frame) = frames.next().await {
                    match frame {
                        Ok(invitations) => {
                            backoff = options.initial_backoff;
                            let mut stale = false;
                            inbox.send_if_modified(|current| {
                                if current.generation != generation {
                                    stale = true;
                                    return false;
                                }
                                if current.invitations == invitations {
                                    return false;
                                }
                                current.invitations = invitations;
                                true
                            });
                            if stale {
                                return;
                            }
                        }
                        Err(err) => warn!(%email, %err, "inbox refresh failed, keeping last inbox"),
                    }
                }
                warn!(%email, "inbox stream ended");
            }
            Err(err) => error!(%email, %err, "inbox subscription failed"),
        }

        if inbox.borrow().generation != generation {
            return;
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(options.max_backoff);
    }
}
