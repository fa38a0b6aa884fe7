//! Team directory: the signed-in user's teams, refreshed on demand.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{IdentityContext, ResultEngine, Team, UserId, store::Store, teams};

#[derive(Clone)]
pub struct TeamDirectory {
    store: Arc<dyn Store>,
    identity: IdentityContext,
    teams: Arc<watch::Sender<Vec<Team>>>,
}

impl TeamDirectory {
    pub fn new(store: Arc<dyn Store>, identity: IdentityContext) -> Self {
        let (teams, _) = watch::channel(Vec::new());
        Self {
            store,
            identity,
            teams: Arc::new(teams),
        }
    }

    /// Creates a team owned by `owner_id` and refreshes the owner's list.
    pub async fn create_team(&self, name: &str, owner_id: &UserId) -> ResultEngine<Team> {
        let name = teams::normalize_team_name(name)?;
        let team = self.store.insert_team(&name, owner_id).await?;
        debug!(team = %team.id, "team created");

        // The team exists at this point; a failed refresh only leaves the
        // cached list behind until the next one.
        if let Err(err) = self.list_my_teams(owner_id).await {
            warn!(%err, "team list refresh after creation failed");
        }
        Ok(team)
    }

    /// Every team `user_id` is a member of. The cached list is replaced when
    /// `user_id` is the signed-in user.
    pub async fn list_my_teams(&self, user_id: &UserId) -> ResultEngine<Vec<Team>> {
        let teams = self.store.teams_with_member(user_id).await?;
        let is_current = self
            .identity
            .current_user()
            .is_some_and(|user| &user.id == user_id);
        if is_current {
            let next = teams.clone();
            self.teams.send_if_modified(|current| {
                if *current == next {
                    return false;
                }
                *current = next;
                true
            });
        }
        Ok(teams)
    }

    /// Last refreshed list of the signed-in user's teams.
    pub fn my_teams(&self) -> Vec<Team> {
        self.teams.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Team>> {
        self.teams.subscribe()
    }

    pub(crate) fn clear(&self) {
        self.teams.send_if_modified(|current| {
            let changed = !current.is_empty();
            current.clear();
            changed
        });
    }
}

impl std::fmt::Debug for TeamDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamDirectory")
            .field("teams", &self.teams.borrow().len())
            .finish_non_exhaustive()
    }
}
