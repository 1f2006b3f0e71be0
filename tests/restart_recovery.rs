//! Restart recovery against a database file that outlives the engine.
//!
//! An election must never stay silently open past its deadline because the
//! process died: on startup, overdue elections close and overdue effects
//! expire before any new event is processed, and doing it twice changes
//! nothing.

use comitia::chat::{ChatEvent, MockChatClient};
use comitia::directory::MockDirectory;
use comitia::governance::{BallotKind, ElectionStatus, Engine, EngineConfig, TimerAction};
use comitia::persistence::Store;
use std::path::PathBuf;

const T0: i64 = 1_700_000_000;

fn msg(sender: &str, text: &str) -> ChatEvent {
    ChatEvent::Message {
        sender: sender.to_string(),
        in_channel: true,
        text: text.to_string(),
    }
}

fn flags(member: &str, flags: &str) -> ChatEvent {
    ChatEvent::FlagSnapshot {
        member: member.to_string(),
        flags: flags.to_string(),
    }
}

async fn first_session(db: &PathBuf) -> Engine<MockChatClient, MockDirectory> {
    let store = Store::open(db).await.unwrap();
    let mut engine = Engine::new(
        MockChatClient::new(),
        MockDirectory::new(),
        store,
        EngineConfig::default(),
    )
    .await
    .unwrap();
    for voter in ["alice", "bob", "carol"] {
        engine.handle_event(flags(voter, "V"), T0).await.unwrap();
    }
    engine.handle_event(msg("mallory", "hello"), T0).await.unwrap();
    engine.handle_event(msg("alice", "vote ban mallory"), T0).await.unwrap();
    engine.handle_event(msg("bob", "vote 1 y"), T0 + 5).await.unwrap();
    engine
}

#[tokio::test]
async fn overdue_election_closes_on_recovery_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("votes.db");

    // session one opens the ballot and dies without closing it
    drop(first_session(&db).await);

    // session two comes up well past the deadline
    let store = Store::open(&db).await.unwrap();
    let chat = MockChatClient::new();
    let directory = MockDirectory::new();
    let mut engine = Engine::new(chat.clone(), directory.clone(), store.clone(), EngineConfig::default())
        .await
        .unwrap();
    let recovered_at = T0 + 4_000; // deadline was T0 + 3600
    engine.recover(recovered_at).await.unwrap();

    let election = store.election(1).await.unwrap().unwrap();
    assert_eq!(election.status, ElectionStatus::Passed);
    assert_eq!(chat.announcements().len(), 1);
    assert!(chat.announcements()[0].contains("The yeas have it"));
    assert_eq!(directory.grants_for("mallory"), vec!["b"]);

    // the effect was scheduled from the recovery clock
    let effect = store.find_effect(BallotKind::Ban, "mallory").await.unwrap().unwrap();
    assert_eq!(effect.expires_at, recovered_at + 259_200);

    // recovering again, or replaying the close timer, changes nothing
    engine.recover(recovered_at + 10).await.unwrap();
    engine.fire(TimerAction::CloseElection(1), recovered_at + 20).await.unwrap();
    assert_eq!(chat.announcements().len(), 1);
    assert_eq!(directory.grants_for("mallory").len(), 1);
}

#[tokio::test]
async fn overdue_effect_expires_on_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("votes.db");

    // session one closes the ballot, so the effect row exists, then dies
    {
        let mut engine = first_session(&db).await;
        engine.fire(TimerAction::CloseElection(1), T0 + 3_600).await.unwrap();
    }

    // session two comes up after the effect should have lapsed
    let store = Store::open(&db).await.unwrap();
    let chat = MockChatClient::new();
    let directory = MockDirectory::new();
    let mut engine = Engine::new(chat.clone(), directory.clone(), store.clone(), EngineConfig::default())
        .await
        .unwrap();
    engine.recover(T0 + 3_600 + 259_200 + 60).await.unwrap();

    assert_eq!(directory.revokes_for("mallory"), vec!["b"]);
    assert!(store.find_effect(BallotKind::Ban, "mallory").await.unwrap().is_none());

    // second recovery finds nothing left to do
    engine.recover(T0 + 3_600 + 259_200 + 120).await.unwrap();
    assert_eq!(directory.revokes_for("mallory").len(), 1);
}

#[tokio::test]
async fn live_deadlines_are_rearmed_not_fired() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("votes.db");

    drop(first_session(&db).await);

    let store = Store::open(&db).await.unwrap();
    let chat = MockChatClient::new();
    let mut engine = Engine::new(chat.clone(), MockDirectory::new(), store.clone(), EngineConfig::default())
        .await
        .unwrap();
    // restart lands before the close deadline
    engine.recover(T0 + 100).await.unwrap();

    assert_eq!(store.election(1).await.unwrap().unwrap().status, ElectionStatus::Open);
    assert!(chat.announcements().is_empty());
    assert_eq!(engine.next_deadline(), Some(T0 + 3_600));

    // identity stats survived the restart: bob keeps his voting flag
    engine.handle_event(msg("carol", "vote 1 n"), T0 + 200).await.unwrap();
    assert_eq!(store.counts(1).await.unwrap(), (2, 1));
}
