use super::*;
use league_core::{OutcomeTag, OutcomeTallies, PlayerRating, RaceTarget, RackSnapshot};
use tokio::sync::broadcast::error::TryRecvError;

fn players() -> [PlayerId; 2] {
    [PlayerId::new("ana"), PlayerId::new("bo")]
}

fn new_match() -> Match {
    Match::new(
        "week-1",
        players(),
        None,
        [RaceTarget::new(2, 2), RaceTarget::new(2, 2)],
    )
}

fn rack(sequence: u32, winner: PlayerSlot) -> Rack {
    Rack {
        key: RackKey::Local(sequence as u64),
        discipline: Discipline::EightBall,
        sequence,
        winner,
        outcome: OutcomeTag::Standard,
        snapshot: RackSnapshot::capture([PlayerRating::default(); 2], winner),
        recorded_at: chrono::Utc::now(),
    }
}

fn finalize_request(match_id: MatchId) -> FinalizeRequest {
    FinalizeRequest {
        match_id,
        discipline: Discipline::EightBall,
        winner: PlayerSlot::One,
        deltas: [10.0, -10.0],
        tallies: [
            OutcomeTallies {
                racks_won: 2,
                ..Default::default()
            },
            OutcomeTallies {
                racks_lost: 2,
                ..Default::default()
            },
        ],
    }
}

#[tokio::test]
async fn test_mutations_are_announced() {
    let store = MemoryStore::new();
    let mut rx = store.changes().subscribe();

    let id = store.insert_match(new_match()).unwrap();
    let notice = rx.try_recv().unwrap();
    assert_eq!(notice.topic, Topic::for_match(id));
    assert_eq!(notice.kind, ChangeKind::Insert);

    store.append_rack(id, rack(1, PlayerSlot::One)).await.unwrap();
    assert_eq!(rx.try_recv().unwrap().table, "racks");

    store
        .update_set_score(id, Discipline::EightBall, [1, 0], SetStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(rx.try_recv().unwrap().kind, ChangeKind::Update);

    store.remove_match(id).unwrap();
    assert_eq!(rx.try_recv().unwrap().kind, ChangeKind::Delete);
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
}

#[tokio::test]
async fn test_append_assigns_key_and_captures_start_ratings() {
    let store = MemoryStore::new();
    store.seed_player(PlayerId::new("ana"), 620.0, 12).unwrap();
    let id = store.insert_match(new_match()).unwrap();

    let stored = store.append_rack(id, rack(1, PlayerSlot::One)).await.unwrap();
    assert!(stored.key.is_confirmed());

    let m = store.read_match(id).await.unwrap();
    let start = m.start_ratings.unwrap();
    assert_eq!(start[0].rating, 620.0);
    assert_eq!(start[0].racks_played, 12);
    assert_eq!(start[1], PlayerRating::default());
    assert!(m.set(Discipline::EightBall).racks.is_empty());
    assert_eq!(store.read_racks(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_sequence_rejected() {
    let store = MemoryStore::new();
    let id = store.insert_match(new_match()).unwrap();
    store.append_rack(id, rack(1, PlayerSlot::One)).await.unwrap();

    let err = store
        .append_rack(id, rack(1, PlayerSlot::Two))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
}

#[tokio::test]
async fn test_closed_set_rejects_racks() {
    let store = MemoryStore::new();
    let id = store.insert_match(new_match()).unwrap();
    store
        .update_set_score(id, Discipline::EightBall, [2, 0], SetStatus::RaceComplete)
        .await
        .unwrap();

    let err = store
        .append_rack(id, rack(3, PlayerSlot::One))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
}

#[tokio::test]
async fn test_finalize_is_atomic_and_single_shot() {
    let store = MemoryStore::new();
    let id = store.insert_match(new_match()).unwrap();

    // Not race complete yet
    let err = store.finalize_set(finalize_request(id)).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));

    store
        .update_set_score(id, Discipline::EightBall, [2, 0], SetStatus::RaceComplete)
        .await
        .unwrap();
    store.finalize_set(finalize_request(id)).await.unwrap();

    let m = store.read_match(id).await.unwrap();
    assert_eq!(m.set(Discipline::EightBall).status, SetStatus::Finalized);
    assert_eq!(m.set(Discipline::EightBall).winner, Some(PlayerSlot::One));

    let book = store.rating_book().unwrap();
    assert_eq!(book.get(&PlayerId::new("ana")).rating, 510.0);
    assert_eq!(book.get(&PlayerId::new("bo")).rating, 490.0);
    assert_eq!(book.get(&PlayerId::new("bo")).racks_played, 2);

    let err = store.finalize_set(finalize_request(id)).await.unwrap_err();
    assert_eq!(
        err,
        StoreError::AlreadyFinalized {
            match_id: id,
            discipline: Discipline::EightBall
        }
    );
    let after = store.rating_book().unwrap();
    assert_eq!(after.get(&PlayerId::new("ana")).rating, 510.0);
    assert_eq!(after.history.len(), 2);

    // Score of a finalized set is frozen
    let err = store
        .update_set_score(id, Discipline::EightBall, [3, 0], SetStatus::RaceComplete)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyFinalized { .. }));
}

#[tokio::test]
async fn test_injected_faults_are_consumed() {
    let store = MemoryStore::new();
    let id = store.insert_match(new_match()).unwrap();

    store.fail_next_reads(2);
    assert!(store.read_match(id).await.unwrap_err().is_transient());
    assert!(store.read_racks(id).await.is_err());
    assert!(store.read_match(id).await.is_ok());

    store.fail_next_writes(1);
    assert!(store.append_rack(id, rack(1, PlayerSlot::One)).await.is_err());
    assert!(store.append_rack(id, rack(1, PlayerSlot::One)).await.is_ok());
}

#[tokio::test]
async fn test_unknown_match() {
    let store = MemoryStore::new();
    let err = store.read_match(MatchId::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}
