//! Workspace selector.
//!
//! Tracks which transaction collection is active. `None` means nobody is
//! signed in and nothing may be subscribed.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::{EngineError, IdentityContext, ResultEngine, User, WorkspaceId};

#[derive(Clone, Debug)]
pub struct WorkspaceSelector {
    identity: IdentityContext,
    active: Arc<watch::Sender<Option<WorkspaceId>>>,
}

impl WorkspaceSelector {
    /// Starts on the personal workspace of the signed-in user, if any.
    pub fn new(identity: IdentityContext) -> Self {
        let initial = identity
            .current_user()
            .map(|user| WorkspaceId::personal(&user.id));
        let (active, _) = watch::channel(initial);
        Self {
            identity,
            active: Arc::new(active),
        }
    }

    pub fn active_workspace(&self) -> Option<WorkspaceId> {
        self.active.borrow().clone()
    }

    /// Switches to `id`. Returns `false` when `id` was already active, in
    /// which case no change notification is emitted.
    pub fn switch_to(&self, id: WorkspaceId) -> ResultEngine<bool> {
        if id.as_str().trim().is_empty() {
            return Err(EngineError::Validation(
                "workspace id must not be empty".to_string(),
            ));
        }
        self.switch_signed_in(|_| id)
    }

    pub fn switch_to_personal(&self) -> ResultEngine<bool> {
        self.switch_signed_in(|user| WorkspaceId::personal(&user.id))
    }

    /// True when the active workspace is the signed-in user's own.
    pub fn is_personal(&self) -> bool {
        match (self.identity.current_user(), self.active.borrow().as_ref()) {
            (Some(user), Some(active)) => active.is_personal_of(&user.id),
            _ => false,
        }
    }

    /// Change notifications, one per effective switch.
    pub fn subscribe(&self) -> watch::Receiver<Option<WorkspaceId>> {
        self.active.subscribe()
    }

    /// Applies an identity transition: a signed-in user lands on their
    /// personal workspace, a sign-out unsets the selection.
    pub(crate) fn reset_for(&self, user: Option<&User>) {
        self.set(user.map(|user| WorkspaceId::personal(&user.id)));
    }

    fn set(&self, next: Option<WorkspaceId>) -> bool {
        let changed = self.active.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next.clone();
            true
        });
        if changed {
            info!(workspace = ?next, "active workspace changed");
        }
        changed
    }

    /// Sets the workspace picked by `target` for the signed-in user. The
    /// identity is read under the selector's lock, so a switch cannot land
    /// after the sign-out reset.
    fn switch_signed_in(
        &self,
        target: impl FnOnce(&User) -> WorkspaceId,
    ) -> ResultEngine<bool> {
        let mut outcome = Err(EngineError::InvalidState(
            "cannot switch workspace while signed out".to_string(),
        ));
        self.active.send_if_modified(|current| {
            let Some(user) = self.identity.current_user() else {
                return false;
            };
            let next = Some(target(&user));
            let changed = *current != next;
            if changed {
                info!(workspace = ?next, "active workspace changed");
                *current = next;
            }
            outcome = Ok(changed);
            changed
        });
        outcome
    }
}
