use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};

use engine::{EngineError, InvitationStatus, TeamId, User, UserId, store::Store};

mod common;

use common::{engine_as, engine_for, store_with_db, wait_for};

async fn membership_rows(db: &DatabaseConnection, team: &TeamId, user: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_sql_and_values(
            backend,
            "SELECT COUNT(*) AS n FROM team_members WHERE team_id = ? AND user_id = ?",
            vec![team.to_string().into(), user.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "n").unwrap()
}

#[tokio::test]
async fn accept_grants_membership_and_closes_the_invitation() {
    let (store, db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let bob = engine_for(&store, "bob").await;

    let team = alice.create_team("Household").await.unwrap();
    assert_eq!(team.members.len(), 1);
    assert!(alice.my_teams().iter().any(|t| t.id == team.id));

    let invitation = alice.send_invite("bob@example.com", &team).await.unwrap();
    assert_eq!(invitation.status, InvitationStatus::Pending);
    assert_eq!(invitation.from_email, "alice@example.com");

    let mut inbox = bob.subscribe_inbox();
    let pending = wait_for(&mut inbox, |i| i.invitations.len() == 1).await;
    assert_eq!(pending.invitations[0].id, invitation.id);

    bob.accept_invite(&invitation).await.unwrap();

    // The team list is refreshed before accept returns.
    assert!(bob.my_teams().iter().any(|t| t.id == team.id));
    let stored = store.get_team(&team.id).await.unwrap();
    assert!(stored.has_member(&UserId::new("alice")));
    assert!(stored.has_member(&UserId::new("bob")));
    assert_eq!(stored.members.len(), 2);
    assert_eq!(
        store.get_invitation(&invitation.id).await.unwrap().status,
        InvitationStatus::Accepted
    );
    wait_for(&mut inbox, |i| i.invitations.is_empty()).await;

    // The caller still holds the pending copy.
    assert!(matches!(
        bob.accept_invite(&invitation).await,
        Err(EngineError::InvalidState(_))
    ));
    assert_eq!(store.get_team(&team.id).await.unwrap().members.len(), 2);
    assert_eq!(membership_rows(&db, &team.id, "bob").await, 1);
}

#[tokio::test]
async fn concurrent_accepts_grant_membership_once() {
    let (store, db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let bob = engine_for(&store, "bob").await;

    let team = alice.create_team("Household").await.unwrap();
    let invitation = alice.send_invite("bob@example.com", &team).await.unwrap();

    let (first, second) = tokio::join!(
        bob.accept_invite(&invitation),
        bob.accept_invite(&invitation)
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(EngineError::InvalidState(_))))
            .count(),
        1
    );

    assert_eq!(membership_rows(&db, &team.id, "bob").await, 1);
    assert_eq!(
        store.get_invitation(&invitation.id).await.unwrap().status,
        InvitationStatus::Accepted
    );
}

#[tokio::test]
async fn reject_only_closes_the_invitation() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let bob = engine_for(&store, "bob").await;

    let team = alice.create_team("Household").await.unwrap();
    let invitation = alice.send_invite("bob@example.com", &team).await.unwrap();

    bob.reject_invite(&invitation).await.unwrap();

    assert_eq!(
        store.get_invitation(&invitation.id).await.unwrap().status,
        InvitationStatus::Rejected
    );
    assert!(!store.get_team(&team.id).await.unwrap().has_member(&UserId::new("bob")));
    assert!(bob.refresh_teams().await.unwrap().is_empty());

    assert!(matches!(
        bob.accept_invite(&invitation).await,
        Err(EngineError::InvalidState(_))
    ));
    assert!(matches!(
        bob.reject_invite(&invitation).await,
        Err(EngineError::InvalidState(_))
    ));
}

#[tokio::test]
async fn terminal_local_copy_fails_without_touching_the_store() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let bob = engine_for(&store, "bob").await;

    let team = alice.create_team("Household").await.unwrap();
    let mut invitation = alice.send_invite("bob@example.com", &team).await.unwrap();
    invitation.status = InvitationStatus::Rejected;

    assert!(matches!(
        bob.accept_invite(&invitation).await,
        Err(EngineError::InvalidState(_))
    ));
    assert_eq!(
        store.get_invitation(&invitation.id).await.unwrap().status,
        InvitationStatus::Pending
    );
}

#[tokio::test]
async fn only_the_addressee_can_accept() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let eve = engine_for(&store, "eve").await;

    let team = alice.create_team("Household").await.unwrap();
    let invitation = alice.send_invite("bob@example.com", &team).await.unwrap();

    assert!(matches!(
        eve.accept_invite(&invitation).await,
        Err(EngineError::Validation(_))
    ));
    assert!(!store.get_team(&team.id).await.unwrap().has_member(&UserId::new("eve")));
    assert_eq!(
        store.get_invitation(&invitation.id).await.unwrap().status,
        InvitationStatus::Pending
    );
}

#[tokio::test]
async fn duplicate_invitations_are_kept() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let bob = engine_for(&store, "bob").await;

    let team = alice.create_team("Household").await.unwrap();
    let first = alice.send_invite("bob@example.com", &team).await.unwrap();
    let second = alice.send_invite("bob@example.com", &team).await.unwrap();
    assert_ne!(first.id, second.id);

    let mut inbox = bob.subscribe_inbox();
    let pending = wait_for(&mut inbox, |i| i.invitations.len() == 2).await;
    assert!(pending.invitations.iter().any(|i| i.id == first.id));
    assert!(pending.invitations.iter().any(|i| i.id == second.id));

    bob.accept_invite(&first).await.unwrap();
    // Membership is a set: the redundant invitation adds nothing.
    bob.accept_invite(&second).await.unwrap();
    assert_eq!(store.get_team(&team.id).await.unwrap().members.len(), 2);
    wait_for(&mut inbox, |i| i.invitations.is_empty()).await;
}

#[tokio::test]
async fn invalid_input_never_reaches_the_store() {
    let (store, _db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;

    assert!(matches!(
        alice.create_team("   ").await,
        Err(EngineError::Validation(_))
    ));
    assert!(alice.refresh_teams().await.unwrap().is_empty());

    let team = alice.create_team(" Household ").await.unwrap();
    assert_eq!(team.name, "Household");
    assert!(matches!(
        alice.send_invite("  ", &team).await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        store.get_team(&TeamId::new("missing")).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn addresses_match_regardless_of_letter_case() {
    let (store, db) = store_with_db().await;
    let alice = engine_for(&store, "alice").await;
    let bob = engine_as(&store, User::new("bob", "Bob@Example.com")).await;

    let team = alice.create_team("Household").await.unwrap();
    let invitation = alice.send_invite("BOB@example.COM", &team).await.unwrap();
    assert_eq!(invitation.to_email, "bob@example.com");

    let mut inbox = bob.subscribe_inbox();
    let pending = wait_for(&mut inbox, |i| i.invitations.len() == 1).await;
    assert_eq!(pending.email.as_deref(), Some("bob@example.com"));
    assert_eq!(pending.invitations[0].id, invitation.id);

    bob.accept_invite(&pending.invitations[0]).await.unwrap();
    assert_eq!(membership_rows(&db, &team.id, "bob").await, 1);
    wait_for(&mut inbox, |i| i.invitations.is_empty()).await;
}
