#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::watch;

use engine::{
    Engine, IdentityContext, MoneyCents, MonthCursor, SyncOptions, TransactionFields, User,
    store::SqlStore,
};
use migration::MigratorTrait;

pub const WAIT: Duration = Duration::from_secs(2);

pub async fn store_with_db() -> (Arc<SqlStore>, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    (Arc::new(SqlStore::new(db.clone())), db)
}

/// An engine for `id` signed in on `store`, looking at March 2024.
pub async fn engine_for(store: &Arc<SqlStore>, id: &str) -> Engine {
    engine_as(store, user(id)).await
}

pub async fn engine_as(store: &Arc<SqlStore>, user: User) -> Engine {
    Engine::builder()
        .store(store.clone())
        .identity(IdentityContext::signed_in(user))
        .sync_options(SyncOptions {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
        })
        .month(MonthCursor::new(2024, 3).unwrap())
        .build()
        .await
        .unwrap()
}

pub fn user(id: &str) -> User {
    User::new(id, format!("{id}@example.com"))
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

pub fn fields(
    cents: i64,
    category: &str,
    note: Option<&str>,
    is_income: bool,
    occurred_at: DateTime<Utc>,
) -> TransactionFields {
    TransactionFields::new(MoneyCents::new(cents), category, note, is_income, occurred_at).unwrap()
}

/// Waits until the watched value satisfies `pred` and returns it.
pub async fn wait_for<T: Clone>(
    rx: &mut watch::Receiver<T>,
    pred: impl FnMut(&T) -> bool,
) -> T {
    tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for a live view")
        .expect("live view closed")
        .clone()
}
