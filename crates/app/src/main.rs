use std::sync::Arc;

use engine::{Engine, IdentityContext, SyncOptions, store::SqlStore};
use migration::{Migrator, MigratorTrait};
use settings::Settings;

mod error;
mod settings;

#[tokio::main]
async fn main() -> error::Result<()> {
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "sharedledger={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let database = sea_orm::Database::connect(settings.database.url()).await?;
    Migrator::up(&database, None).await?;

    let identity = match settings.identity.clone() {
        Some(identity) => IdentityContext::signed_in(identity.into()),
        None => {
            tracing::warn!("no identity configured, starting signed out");
            IdentityContext::new()
        }
    };

    let engine = Engine::builder()
        .store(Arc::new(SqlStore::new(database)))
        .identity(identity)
        .sync_options(SyncOptions::from(&settings.sync))
        .totals_scope(settings.aggregation.totals)
        .build()
        .await?;
    tracing::info!(workspace = ?engine.active_workspace(), "engine ready");

    let mut views = engine.subscribe_monthly_view();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                tracing::info!(
                    month = %format!("{}-{:02}", view.month.year(), view.month.month()),
                    transactions = view.transactions.len(),
                    income = %view.totals.income,
                    expense = %view.totals.expense,
                    net = %view.totals.net,
                    "monthly view"
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("shutting down");
                break;
            }
        }
    }

    engine.identity().sign_out();
    Ok(())
}
