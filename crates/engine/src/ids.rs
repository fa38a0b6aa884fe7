//! Strongly typed identifiers.
//!
//! Every id is an opaque string issued by the store (or by the identity
//! provider for users). Newtypes keep a team id from being passed where a
//! transaction id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[allow(dead_code)]
            pub(crate) fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Stable id of an authenticated user.
    UserId
);
string_id!(TeamId);
string_id!(InvitationId);
string_id!(TransactionId);
string_id!(CategoryId);
string_id!(
    /// Partition key of a transaction collection: a user id for the personal
    /// workspace, a team id for a shared one.
    WorkspaceId
);

impl WorkspaceId {
    pub fn personal(user_id: &UserId) -> Self {
        Self(user_id.0.clone())
    }

    pub fn is_personal_of(&self, user_id: &UserId) -> bool {
        self.0 == user_id.0
    }
}

impl From<&TeamId> for WorkspaceId {
    fn from(team_id: &TeamId) -> Self {
        Self(team_id.0.clone())
    }
}
