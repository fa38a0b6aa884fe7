use tokio::sync::watch;

use crate::{ResultEngine, Team, TransactionSnapshot, User, WorkspaceId};

use super::Engine;

impl Engine {
    pub fn current_user(&self) -> Option<User> {
        self.identity.current_user()
    }

    pub fn active_workspace(&self) -> Option<WorkspaceId> {
        self.selector.active_workspace()
    }

    /// Switches the active workspace. Returns `false` if `id` was already
    /// active.
    pub fn switch_to(&self, id: impl Into<WorkspaceId>) -> ResultEngine<bool> {
        self.selector.switch_to(id.into())
    }

    pub fn switch_to_team(&self, team: &Team) -> ResultEngine<bool> {
        self.selector.switch_to(team.workspace_id())
    }

    pub fn switch_to_personal(&self) -> ResultEngine<bool> {
        self.selector.switch_to_personal()
    }

    pub fn is_personal_mode(&self) -> bool {
        self.selector.is_personal()
    }

    /// Latest full snapshot of the active workspace.
    pub fn snapshot(&self) -> TransactionSnapshot {
        self.sync.snapshot()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<TransactionSnapshot> {
        self.sync.subscribe()
    }
}
