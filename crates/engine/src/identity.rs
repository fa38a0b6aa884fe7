//! Identity context: who is signed in.
//!
//! The context is constructed once per process and handed to the engine.
//! Sign-in and sign-out are pushed into it by the authentication layer; the
//! engine only ever observes it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::UserId;

/// An authenticated user as issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Addressing key for invitations.
    pub email: String,
}

impl User {
    pub fn new(id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IdentityContext {
    current: Arc<watch::Sender<Option<User>>>,
}

impl IdentityContext {
    /// A context with nobody signed in.
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current: Arc::new(current),
        }
    }

    pub fn signed_in(user: User) -> Self {
        let ctx = Self::new();
        ctx.sign_in(user);
        ctx
    }

    /// Publishes a signed-in user. Re-signing the same user is not a change.
    pub fn sign_in(&self, user: User) {
        self.current.send_if_modified(|current| {
            if current.as_ref() == Some(&user) {
                return false;
            }
            *current = Some(user);
            true
        });
    }

    pub fn sign_out(&self) {
        self.current.send_if_modified(|current| current.take().is_some());
    }

    pub fn current_user(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    /// Change notifications on sign-in/sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }
}

impl Default for IdentityContext {
    fn default() -> Self {
        Self::new()
    }
}
