use tokio::sync::watch;

use crate::{Inbox, Invitation, ResultEngine, Team};

use super::Engine;

impl Engine {
    /// Invites `to_email` into `team` on behalf of the signed-in user.
    pub async fn send_invite(&self, to_email: &str, team: &Team) -> ResultEngine<Invitation> {
        let user = self.require_user()?;
        self.invitations
            .send_invite(&user.email, to_email, team.id.clone(), &team.name)
            .await
    }

    pub fn pending_invitations(&self) -> Vec<Invitation> {
        self.invitations.my_pending_invites()
    }

    pub fn subscribe_inbox(&self) -> watch::Receiver<Inbox> {
        self.invitations.subscribe_inbox()
    }

    pub async fn accept_invite(&self, invitation: &Invitation) -> ResultEngine<()> {
        let user = self.require_user()?;
        self.invitations.accept(invitation, &user).await
    }

    pub async fn reject_invite(&self, invitation: &Invitation) -> ResultEngine<()> {
        let user = self.require_user()?;
        self.invitations.reject(invitation, &user).await
    }
}
