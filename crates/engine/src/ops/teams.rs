use tokio::sync::watch;

use crate::{ResultEngine, Team};

use super::Engine;

impl Engine {
    /// Creates a team owned by the signed-in user.
    pub async fn create_team(&self, name: &str) -> ResultEngine<Team> {
        let user = self.require_user()?;
        self.teams.create_team(name, &user.id).await
    }

    pub fn my_teams(&self) -> Vec<Team> {
        self.teams.my_teams()
    }

    pub async fn refresh_teams(&self) -> ResultEngine<Vec<Team>> {
        let user = self.require_user()?;
        self.teams.list_my_teams(&user.id).await
    }

    pub fn subscribe_teams(&self) -> watch::Receiver<Vec<Team>> {
        self.teams.subscribe()
    }
}
