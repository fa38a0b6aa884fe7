//! Workspace-scoped sync and aggregation engine for shared finance ledgers.
//!
//! A signed-in user works in one workspace at a time: their personal one or a
//! team they belong to. The engine keeps a live, full snapshot of the active
//! workspace's transactions, derives a monthly view from it, and manages team
//! membership through invitations accepted in a single atomic commit.

pub use aggregation::{
    Aggregation, MonthCursor, MonthlyView, Totals, TotalsScope, aggregate, matches_search,
};
pub use categories::Category;
pub use directory::TeamDirectory;
pub use error::EngineError;
pub use identity::{IdentityContext, User};
pub use ids::{CategoryId, InvitationId, TeamId, TransactionId, UserId, WorkspaceId};
pub use inbox::{Inbox, InvitationEngine};
pub use invitations::{Invitation, InvitationStatus, NewInvitation};
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder};
pub use sync::{SyncOptions, TransactionSnapshot, TransactionSync};
pub use teams::Team;
pub use transactions::{Transaction, TransactionFields};
pub use workspace::WorkspaceSelector;

mod aggregation;
mod categories;
mod directory;
mod error;
mod identity;
mod ids;
mod inbox;
mod invitations;
mod money;
mod ops;
pub mod store;
mod sync;
mod team_members;
mod teams;
mod transactions;
mod workspace;

pub type ResultEngine<T> = Result<T, EngineError>;
