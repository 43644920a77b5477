use serde_json::{Value, json};
use std::time::Duration;
use tokio_test::task::spawn;
use tokio_test::{assert_pending, assert_ready, assert_ready_ok};
use tourney_optimistic::domain::{
    EntryFeeRole, GameConfig, Metadata, Period, Prize, PrizeType, Schedule, TokenType, Tournament,
};
use tourney_optimistic::{
    ClaimConfirmation, EntityRecord, EntityStore, InMemoryEntityStore, ModelData, ObservedView,
    OptimisticConfig, OptimisticUpdates, Session, SyncError, derive_entity_id,
};

const NS: &str = "tournaments";

fn data(value: Value) -> ModelData {
    value.as_object().cloned().unwrap()
}

fn updates() -> OptimisticUpdates<InMemoryEntityStore> {
    OptimisticUpdates::new(InMemoryEntityStore::new())
}

fn authoritative_updates(config: OptimisticConfig) -> OptimisticUpdates<InMemoryEntityStore> {
    OptimisticUpdates::with_config(
        InMemoryEntityStore::new(),
        config.observed_view(ObservedView::Authoritative),
    )
    .unwrap()
}

fn tournament(id: u64) -> Tournament {
    Tournament {
        id,
        created_at: 1_700_000_000,
        created_by: "0x5eed".into(),
        creator_token_id: 1,
        metadata: Metadata {
            name: "Weekend Cup".into(),
            description: "Top score wins".into(),
        },
        schedule: Schedule {
            registration: None,
            game: Period {
                start: 1_700_000_100,
                end: 1_700_086_500,
            },
            submission_duration: 3600,
        },
        game_config: GameConfig {
            address: "0x9a3e".into(),
            settings_id: 1,
            prize_spots: 3,
        },
        entry_fee: None,
    }
}

fn prize(id: u64, tournament_id: u64) -> Prize {
    Prize {
        id,
        tournament_id,
        payout_position: 1,
        token_address: "0xabc".into(),
        token_type: TokenType::Erc20 {
            amount: "0x64".into(),
        },
        claimed: false,
    }
}

fn indexed(keys: &[u128], model: &str, value: Value) -> EntityRecord {
    EntityRecord::with_model(derive_entity_id(keys), NS, model, data(value))
}

fn ingest_count(store: &InMemoryEntityStore, tournament_id: u64, count: u32) {
    store
        .merge_entities([indexed(
            &[u128::from(tournament_id)],
            "EntryCount",
            json!({"tournament_id": tournament_id, "count": count}),
        )])
        .unwrap();
}

#[test]
fn test_entry_update_scenario() {
    let updates = updates();
    let handle = updates.apply_tournament_entry_update(7, 5, 2).unwrap();
    let store = updates.store();

    let count = store.entity(&derive_entity_id(&[7])).unwrap().unwrap();
    assert_eq!(count.field(NS, "EntryCount", "count"), Some(&json!(5)));

    let registration = store.entity(&derive_entity_id(&[7, 2])).unwrap().unwrap();
    assert_eq!(registration.field(NS, "Registration", "entry_number"), Some(&json!(5)));
    assert_eq!(registration.field(NS, "Registration", "has_submitted"), Some(&json!(false)));

    assert_eq!(
        handle.tracked_entities(),
        vec![derive_entity_id(&[7]), derive_entity_id(&[7, 2])]
    );

    // The projected count already equals the target, so the wait is ready at once
    let mut wait = spawn(handle.wait());
    let records = assert_ready_ok!(wait.poll());
    assert_eq!(records.len(), 2);
}

#[test]
fn test_entry_wait_follows_indexer() {
    let updates = authoritative_updates(OptimisticConfig::default());
    let handle = updates.apply_tournament_entry_update(7, 5, 2).unwrap();
    let store = updates.store();

    let mut wait = spawn(handle.wait());
    assert_pending!(wait.poll());

    // The indexer may encode integers as hex strings
    store
        .merge_entities([indexed(&[7], "EntryCount", json!({"tournament_id": "0x7", "count": "0x5"}))])
        .unwrap();
    assert_pending!(wait.poll());

    store
        .merge_entities([indexed(
            &[7, 2],
            "Registration",
            json!({"tournament_id": 7, "entry_number": 5, "has_submitted": false}),
        )])
        .unwrap();
    assert!(wait.is_woken());
    assert_ready_ok!(wait.poll());

    handle.confirm().unwrap();
    assert!(store.pending_transactions().unwrap().is_empty());
    assert_eq!(store.total_subscribers().unwrap(), 0);
}

#[test]
fn test_claim_update_scenario() {
    let updates = updates();
    let prize_types: Vec<PrizeType> = ["Sponsored:3", "EntryFees.Position:1"]
        .iter()
        .map(|text| text.parse().unwrap())
        .collect();

    let handle = updates
        .apply_tournament_claim_prizes_update(7, &prize_types)
        .unwrap();

    let deltas = updates
        .store()
        .transaction_deltas(&handle.transaction_id())
        .unwrap()
        .unwrap();
    assert_eq!(deltas.len(), 2);
    for delta in &deltas {
        assert_eq!(delta.entity_id, derive_entity_id(&[7]));
        assert_eq!(delta.model, "PrizeClaim");
        assert_eq!(delta.data.get("claimed"), Some(&json!(true)));
    }
    assert_eq!(
        deltas[1].data.get("prize_type"),
        Some(&json!({"EntryFees": {"Position": 1}}))
    );
    assert_eq!(handle.waiter_count(), 1);

    let mut wait = spawn(handle.wait());
    assert_ready_ok!(wait.poll());
}

#[test]
fn test_empty_claim_list_is_an_empty_transaction() {
    let updates = authoritative_updates(
        OptimisticConfig::default().claim_confirmation(ClaimConfirmation::Observed),
    );
    let handle = updates.apply_tournament_claim_prizes_update(7, &[]).unwrap();

    let deltas = updates
        .store()
        .transaction_deltas(&handle.transaction_id())
        .unwrap()
        .unwrap();
    assert!(deltas.is_empty());
    assert!(updates.store().entity(&derive_entity_id(&[7])).unwrap().is_none());

    let mut wait = spawn(handle.wait());
    assert_ready_ok!(wait.poll());
    handle.confirm().unwrap();
}

#[test]
fn test_unconditional_claim_ignores_indexer() {
    let updates = authoritative_updates(OptimisticConfig::default());
    let handle = updates
        .apply_tournament_claim_prizes_update(7, &[PrizeType::Sponsored(3)])
        .unwrap();

    let mut wait = spawn(handle.wait());
    assert_ready_ok!(wait.poll());
}

#[test]
fn test_observed_claim_waits_for_indexer() {
    let updates = authoritative_updates(
        OptimisticConfig::default().claim_confirmation(ClaimConfirmation::Observed),
    );
    let handle = updates
        .apply_tournament_claim_prizes_update(
            7,
            &[PrizeType::EntryFees(EntryFeeRole::TournamentCreator)],
        )
        .unwrap();

    let mut wait = spawn(handle.wait());
    assert_pending!(wait.poll());

    updates
        .store()
        .merge_entities([indexed(
            &[7],
            "PrizeClaim",
            json!({"tournament_id": 7, "prize_type": {"EntryFees": "TournamentCreator"}, "claimed": true}),
        )])
        .unwrap();
    assert_ready_ok!(wait.poll());
}

#[test]
fn test_create_tournament_scenario() {
    let updates = authoritative_updates(OptimisticConfig::default());
    let prizes = [prize(101, 9), prize(102, 9)];
    let handle = updates
        .apply_tournament_create_and_add_prizes_update(&tournament(9), &prizes)
        .unwrap();

    assert_eq!(
        handle.tracked_entities(),
        vec![
            derive_entity_id(&[9]),
            derive_entity_id(&[9, 101]),
            derive_entity_id(&[9, 102]),
        ]
    );
    assert_eq!(handle.waiter_count(), 3);

    let store = updates.store();
    let created = store.entity(&derive_entity_id(&[9])).unwrap().unwrap();
    assert_eq!(created.field(NS, "Tournament", "id"), Some(&json!(9)));

    let mut wait = spawn(handle.wait());
    assert_pending!(wait.poll());

    store
        .merge_entities([
            indexed(&[9], "Tournament", json!({"id": "0x9"})),
            indexed(&[9, 101], "Prize", json!({"id": 101})),
        ])
        .unwrap();
    assert_pending!(wait.poll());

    store
        .merge_entities([indexed(&[9, 102], "Prize", json!({"id": "102"}))])
        .unwrap();
    let records = assert_ready_ok!(wait.poll());
    assert_eq!(records.len(), 3);
}

#[test]
fn test_prizes_update_keys_by_prize_id() {
    let updates = updates();
    let handle = updates
        .apply_tournament_prizes_update(&[prize(101, 9), prize(102, 9)])
        .unwrap();

    assert_eq!(
        handle.tracked_entities(),
        vec![derive_entity_id(&[101]), derive_entity_id(&[102])]
    );
    let stored = updates
        .store()
        .entity(&derive_entity_id(&[102]))
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.field(NS, "Prize", "token_type"),
        Some(&json!({"erc20": {"amount": "0x64"}}))
    );

    let mut wait = spawn(handle.wait());
    assert_ready_ok!(wait.poll());
}

#[test]
fn test_invalid_input_mutates_nothing() {
    let updates = updates();
    let store = updates.store();

    assert!(matches!(
        updates.apply_tournament_entry_update(7, 0, 1),
        Err(SyncError::InvalidInput(_))
    ));
    assert!(matches!(
        updates.apply_tournament_prizes_update(&[prize(1, 9), prize(1, 9)]),
        Err(SyncError::InvalidInput(_))
    ));
    assert!(matches!(
        updates.apply_tournament_create_and_add_prizes_update(&tournament(9), &[prize(1, 8)]),
        Err(SyncError::InvalidInput(_))
    ));
    assert!(store.snapshot(ObservedView::Projected).unwrap().is_empty());
    assert!(store.pending_transactions().unwrap().is_empty());
}

#[test]
fn test_confirm_keeps_newer_indexer_count() {
    let updates = updates();
    let handle = updates.apply_tournament_entry_update(7, 5, 2).unwrap();
    let store = updates.store();
    let count_id = derive_entity_id(&[7]);

    ingest_count(store, 7, 5);
    ingest_count(store, 7, 6);

    // Another player registered meanwhile; the indexer's value shows through
    let projected = store.entity(&count_id).unwrap().unwrap();
    assert_eq!(projected.field(NS, "EntryCount", "count"), Some(&json!(6)));

    handle.confirm().unwrap();
    let authoritative = store
        .read(&count_id, ObservedView::Authoritative)
        .unwrap()
        .unwrap();
    assert_eq!(authoritative.field(NS, "EntryCount", "count"), Some(&json!(6)));
    assert_eq!(store.entity(&count_id).unwrap(), Some(authoritative));

    // The registration the indexer never touched is folded as written
    let registration = store
        .read(&derive_entity_id(&[7, 2]), ObservedView::Authoritative)
        .unwrap()
        .unwrap();
    assert_eq!(registration.field(NS, "Registration", "entry_number"), Some(&json!(5)));
}

#[test]
fn test_handle_revert_is_guarded() {
    let updates = updates();
    let handle = updates.apply_tournament_entry_update(7, 1, 1).unwrap();
    let store = updates.store();

    handle.revert().unwrap();
    assert!(store.entity(&derive_entity_id(&[7])).unwrap().is_none());
    assert!(store.entity(&derive_entity_id(&[7, 1])).unwrap().is_none());

    // Already resolved: both calls are silent no-ops
    handle.revert().unwrap();
    handle.confirm().unwrap();
    assert!(store.snapshot(ObservedView::Projected).unwrap().is_empty());
}

#[test]
fn test_wait_fails_when_store_closes() {
    let updates = authoritative_updates(OptimisticConfig::default());
    let handle = updates.apply_tournament_entry_update(7, 1, 1).unwrap();

    let mut wait = spawn(handle.wait());
    assert_pending!(wait.poll());

    updates.store().close().unwrap();
    assert!(matches!(
        assert_ready!(wait.poll()),
        Err(SyncError::SubscriptionClosed(_))
    ));
    assert_eq!(updates.store().total_subscribers().unwrap(), 0);
}

#[tokio::test]
async fn test_wait_timeout_is_opt_in() {
    let updates =
        authoritative_updates(OptimisticConfig::default().wait_timeout(Duration::from_millis(20)));
    let handle = updates.apply_tournament_entry_update(7, 1, 1).unwrap();

    let outcome = handle.wait().await;
    assert!(matches!(outcome, Err(SyncError::WaitTimeout(limit)) if limit == Duration::from_millis(20)));
    assert_eq!(updates.store().total_subscribers().unwrap(), 0);

    // A timed-out wait leaves the optimistic layer in place for the caller to resolve
    assert_eq!(updates.store().pending_transactions().unwrap().len(), 1);
    handle.revert().unwrap();
}

#[tokio::test]
async fn test_session_round_trip() {
    let session = Session::with_config(OptimisticConfig::new(NS)).unwrap();
    let handle = session.updates().apply_tournament_entry_update(3, 1, 1).unwrap();

    handle.wait().await.unwrap();
    session
        .ingest([indexed(&[3], "EntryCount", json!({"tournament_id": 3, "count": 1}))])
        .unwrap();
    handle.confirm().unwrap();

    let authoritative = session
        .store()
        .read(&derive_entity_id(&[3]), ObservedView::Authoritative)
        .unwrap()
        .unwrap();
    assert_eq!(authoritative.field(NS, "EntryCount", "count"), Some(&json!(1)));
}
