use std::{collections::BTreeSet, time::Duration};

use engine::{EngineError, MoneyCents, MonthCursor, TransactionId, WorkspaceId};

mod common;

use common::{at, engine_for, fields, store_with_db, wait_for};

fn ids(snapshot: &engine::TransactionSnapshot) -> BTreeSet<String> {
    snapshot
        .transactions
        .iter()
        .map(|tx| tx.id.to_string())
        .collect()
}

#[tokio::test]
async fn added_transaction_arrives_through_the_snapshot() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let mut snapshots = alice.subscribe_snapshot();

    let id = alice
        .add_transaction(fields(1250, " Food ", Some("market"), false, at(2024, 3, 5, 10, 0, 0)))
        .await
        .unwrap();

    let snapshot = wait_for(&mut snapshots, |s| s.transactions.len() == 1).await;
    let tx = &snapshot.transactions[0];
    assert_eq!(tx.id, id);
    assert_eq!(tx.category, "Food");
    assert_eq!(tx.amount, MoneyCents::new(1250));
    assert_eq!(tx.recorded_by, "alice@example.com");
    assert_eq!(snapshot.workspace, Some(WorkspaceId::new("alice")));
}

#[tokio::test]
async fn update_and_delete_show_up_on_the_next_snapshot() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let mut snapshots = alice.subscribe_snapshot();

    let id = alice
        .add_transaction(fields(100, "Food", None, false, at(2024, 3, 5, 10, 0, 0)))
        .await
        .unwrap();
    wait_for(&mut snapshots, |s| s.transactions.len() == 1).await;

    alice
        .update_transaction(&id, fields(900, "Rent", Some("march"), false, at(2024, 3, 1, 9, 0, 0)))
        .await
        .unwrap();
    let snapshot = wait_for(&mut snapshots, |s| {
        s.transactions.first().is_some_and(|tx| tx.category == "Rent")
    })
    .await;
    assert_eq!(snapshot.transactions[0].amount, MoneyCents::new(900));
    assert_eq!(snapshot.transactions[0].note.as_deref(), Some("march"));
    assert_eq!(snapshot.transactions[0].recorded_by, "alice@example.com");

    alice.delete_transaction(&id).await.unwrap();
    wait_for(&mut snapshots, |s| s.transactions.is_empty()).await;

    assert!(matches!(
        alice.delete_transaction(&id).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        alice
            .update_transaction(
                &TransactionId::new("missing"),
                fields(1, "Food", None, false, at(2024, 3, 1, 0, 0, 0)),
            )
            .await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn switching_away_and_back_never_mixes_workspaces() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let team = alice.create_team("Household").await.unwrap();

    let personal = alice
        .add_transaction(fields(100, "Food", None, false, at(2024, 3, 5, 10, 0, 0)))
        .await
        .unwrap();
    alice.switch_to_team(&team).unwrap();
    let shared = alice
        .add_transaction(fields(700, "Rent", None, false, at(2024, 3, 1, 9, 0, 0)))
        .await
        .unwrap();

    // Back and forth before the team subscription settles.
    alice.switch_to_team(&team).unwrap();
    alice.switch_to_personal().unwrap();
    alice.switch_to_team(&team).unwrap();
    alice.switch_to_personal().unwrap();

    let mut snapshots = alice.subscribe_snapshot();
    let snapshot = wait_for(&mut snapshots, |s| {
        s.loaded && s.workspace == Some(WorkspaceId::new("alice"))
    })
    .await;
    assert_eq!(ids(&snapshot), BTreeSet::from([personal.to_string()]));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = alice.snapshot();
    assert_eq!(settled.workspace, Some(WorkspaceId::new("alice")));
    assert!(!ids(&settled).contains(&shared.to_string()));
    assert_eq!(
        alice.transaction_sync().active_workspace(),
        alice.active_workspace()
    );
    assert!(alice.is_personal_mode());
}

#[tokio::test]
async fn switching_to_the_active_workspace_is_a_no_op() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let team = alice.create_team("Trip").await.unwrap();
    let started = alice.transaction_sync().subscriptions_started();

    assert!(alice.switch_to_team(&team).unwrap());
    assert!(!alice.switch_to_team(&team).unwrap());

    let mut snapshots = alice.subscribe_snapshot();
    wait_for(&mut snapshots, |s| {
        s.loaded && s.workspace == Some(team.workspace_id())
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(alice.transaction_sync().subscriptions_started(), started + 1);
    assert!(!alice.is_personal_mode());
}

#[tokio::test]
async fn team_members_see_each_others_writes_live() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let bob = engine_for(&store, "bob").await;

    let team = alice.create_team("Flat").await.unwrap();
    let invitation = alice.send_invite("bob@example.com", &team).await.unwrap();
    bob.accept_invite(&invitation).await.unwrap();

    alice.switch_to_team(&team).unwrap();
    bob.switch_to_team(&team).unwrap();
    let mut alice_view = alice.subscribe_snapshot();
    wait_for(&mut alice_view, |s| s.loaded && s.workspace == Some(team.workspace_id())).await;

    bob.add_transaction(fields(4200, "Groceries", None, false, at(2024, 3, 12, 18, 0, 0)))
        .await
        .unwrap();

    let snapshot = wait_for(&mut alice_view, |s| s.transactions.len() == 1).await;
    assert_eq!(snapshot.transactions[0].recorded_by, "bob@example.com");
}

#[tokio::test]
async fn monthly_view_totals_and_order() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let mut views = alice.subscribe_monthly_view();

    alice
        .add_transaction(fields(100, "Salary", None, true, at(2024, 3, 1, 8, 0, 0)))
        .await
        .unwrap();
    alice
        .add_transaction(fields(200, "Bonus", None, true, at(2024, 3, 20, 8, 0, 0)))
        .await
        .unwrap();
    alice
        .add_transaction(fields(50, "Food", Some("lunch"), false, at(2024, 3, 10, 13, 0, 0)))
        .await
        .unwrap();
    alice
        .add_transaction(fields(999, "Food", None, false, at(2024, 4, 1, 0, 0, 0)))
        .await
        .unwrap();

    let view = wait_for(&mut views, |v| v.transactions.len() == 3).await;
    assert_eq!(view.month, MonthCursor::new(2024, 3).unwrap());
    assert_eq!(view.totals.income, MoneyCents::new(300));
    assert_eq!(view.totals.expense, MoneyCents::new(50));
    assert_eq!(view.totals.net, MoneyCents::new(250));
    let categories: Vec<&str> = view.transactions.iter().map(|t| t.category.as_str()).collect();
    assert_eq!(categories, ["Bonus", "Food", "Salary"]);

    alice.set_search_query("LUNCH");
    let view = wait_for(&mut views, |v| v.query == "LUNCH").await;
    assert_eq!(view.transactions.len(), 1);
    assert_eq!(view.totals.expense, MoneyCents::new(50));
    assert_eq!(view.totals.income, MoneyCents::ZERO);

    alice.set_search_query("");
    alice.next_month();
    let view = wait_for(&mut views, |v| {
        v.month == MonthCursor::new(2024, 4).unwrap() && v.query.is_empty()
    })
    .await;
    assert_eq!(view.transactions.len(), 1);
    assert_eq!(view.totals.expense, MoneyCents::new(999));
}

#[tokio::test]
async fn categories_are_scoped_to_the_active_workspace() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;

    let food = alice.add_category("  Food ", false).await.unwrap();
    alice.add_category("Salary", true).await.unwrap();
    assert_eq!(food.name, "Food");
    assert!(matches!(
        alice.add_category("   ", false).await,
        Err(EngineError::Validation(_))
    ));

    let expenses = alice.categories(false).await.unwrap();
    assert_eq!(expenses, vec![food.clone()]);
    assert_eq!(alice.categories(true).await.unwrap().len(), 1);

    let team = alice.create_team("Club").await.unwrap();
    alice.switch_to_team(&team).unwrap();
    assert!(alice.categories(false).await.unwrap().is_empty());
    assert!(matches!(
        alice.delete_category(&food.id).await,
        Err(EngineError::NotFound(_))
    ));

    alice.switch_to_personal().unwrap();
    alice.delete_category(&food.id).await.unwrap();
    assert!(alice.categories(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn sign_out_tears_everything_down() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    alice.create_team("Household").await.unwrap();
    alice
        .add_transaction(fields(100, "Food", None, false, at(2024, 3, 5, 10, 0, 0)))
        .await
        .unwrap();
    let mut snapshots = alice.subscribe_snapshot();
    wait_for(&mut snapshots, |s| s.transactions.len() == 1).await;
    assert_eq!(alice.my_teams().len(), 1);

    alice.identity().sign_out();

    let snapshot = wait_for(&mut snapshots, |s| s.workspace.is_none()).await;
    assert!(snapshot.transactions.is_empty());
    let mut teams = alice.subscribe_teams();
    wait_for(&mut teams, |teams| teams.is_empty()).await;
    assert_eq!(alice.active_workspace(), None);
    assert_eq!(alice.transaction_sync().active_workspace(), None);
    assert!(alice.pending_invitations().is_empty());

    assert!(matches!(
        alice.switch_to(WorkspaceId::new("alice")),
        Err(EngineError::InvalidState(_))
    ));
    assert!(matches!(
        alice
            .add_transaction(fields(1, "Food", None, false, at(2024, 3, 5, 10, 0, 0)))
            .await,
        Err(EngineError::InvalidState(_))
    ));

    alice.identity().sign_in(common::user("alice"));
    let snapshot = wait_for(&mut snapshots, |s| {
        s.loaded && s.workspace == Some(WorkspaceId::new("alice"))
    })
    .await;
    assert_eq!(snapshot.transactions.len(), 1);
}

#[tokio::test]
async fn quick_sign_out_and_back_in_lands_on_personal() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let team = alice.create_team("Household").await.unwrap();
    alice.switch_to_team(&team).unwrap();
    let mut snapshots = alice.subscribe_snapshot();
    wait_for(&mut snapshots, |s| {
        s.loaded && s.workspace == Some(WorkspaceId::from(&team.id))
    })
    .await;

    // Back to back, the identity follower sees a single change.
    alice.identity().sign_out();
    alice.identity().sign_in(common::user("alice"));

    let snapshot = wait_for(&mut snapshots, |s| {
        s.loaded && s.workspace == Some(WorkspaceId::new("alice"))
    })
    .await;
    assert!(snapshot.transactions.is_empty());
    assert_eq!(alice.active_workspace(), Some(WorkspaceId::new("alice")));
    assert!(alice.is_personal_mode());
    let mut teams = alice.subscribe_teams();
    wait_for(&mut teams, |teams| teams.iter().any(|t| t.id == team.id)).await;
}
