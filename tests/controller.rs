use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use match_sync::bridge::{IdentityHandle, UiChannel};
use match_sync::collaborators::{Collaborators, SessionStore, Subscription};
use match_sync::config::SyncConfig;
use match_sync::error::StoreError;
use match_sync::memory::InMemorySessionStore;
use match_sync::models::events::{Destination, Notification, Severity, UiEvent};
use match_sync::models::identity::Actor;
use match_sync::models::match_state::MatchStatus;
use match_sync::models::record::RawMatch;
use match_sync::normalize::JsonNormalizer;
use match_sync::{MatchController, MatchView};

const MATCH_ID: &str = "abc123";

struct Harness {
    store: Arc<InMemorySessionStore>,
    identity: Arc<IdentityHandle>,
    events: mpsc::UnboundedReceiver<UiEvent>,
    controller: MatchController,
}

impl Harness {
    fn start(store: Arc<InMemorySessionStore>, identity: IdentityHandle) -> Self {
        Self::start_with(store, identity, SyncConfig::default())
    }

    fn start_with(
        store: Arc<InMemorySessionStore>,
        identity: IdentityHandle,
        config: SyncConfig,
    ) -> Self {
        let identity = Arc::new(identity);
        let (ui, events) = UiChannel::new();
        let ui = Arc::new(ui);
        let deps = Collaborators {
            store: store.clone(),
            normalizer: Arc::new(JsonNormalizer),
            navigator: ui.clone(),
            notifier: ui,
            identity: identity.clone(),
        };
        let controller = MatchController::start(MATCH_ID, deps, config);
        Self {
            store,
            identity,
            events,
            controller,
        }
    }

    async fn wait_for(&self, what: &str, predicate: impl FnMut(&MatchView) -> bool) -> MatchView {
        let mut rx = self.controller.watch();
        let view = match tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate)).await {
            Ok(Ok(view)) => view.clone(),
            _ => panic!("timed out waiting for {what}: {:?}", self.controller.view()),
        };
        view
    }

    fn drain_events(&mut self) -> Vec<UiEvent> {
        drain(&mut self.events)
    }
}

fn drain(events: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn ana() -> Actor {
    Actor::new("u1", "Ana")
}

/// Lets every spawned task run until it blocks.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

fn message(author: &str, text: &str) -> Value {
    json!({ "userName": author, "text": text, "createdAt": 0 })
}

async fn store_with(record: Value) -> Arc<InMemorySessionStore> {
    let store = InMemorySessionStore::new();
    store.put(MATCH_ID, record).await;
    store
}

#[tokio::test]
async fn first_join_publishes_waiting_match() {
    let store = store_with(json!({ "status": "WAITING", "users": [], "messages": [] })).await;
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));

    let view = harness
        .wait_for("first-time join", |v| {
            v.is_first_time
                && v.snapshot
                    .as_ref()
                    .is_some_and(|game| game.has_participant("u1"))
        })
        .await;

    assert_eq!(
        harness.store.join_calls(),
        vec![(MATCH_ID.to_owned(), "u1".to_owned())]
    );
    let game = view.snapshot.unwrap();
    assert_eq!(game.status, MatchStatus::Waiting);
    assert!(!view.is_loading);
}

#[tokio::test]
async fn foreign_message_after_empty_chat_sets_unread() {
    let store = store_with(json!({ "status": "WAITING", "users": [{ "id": "u1", "name": "Ana" }], "messages": [] })).await;
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("first snapshot", |v| v.snapshot.is_some()).await;
    assert!(!harness.controller.view().has_new_messages);

    harness
        .store
        .put(
            MATCH_ID,
            json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }], "messages": [message("u2", "hi")] }),
        )
        .await;

    let view = harness.wait_for("unread", |v| v.has_new_messages).await;
    assert_eq!(view.snapshot.unwrap().status, MatchStatus::Active);
}

#[tokio::test]
async fn existing_participant_is_never_joined() {
    let store = store_with(json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));

    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;
    settle().await;

    assert_eq!(harness.store.fetch_calls(), 1);
    assert!(harness.store.join_calls().is_empty());
    assert!(!harness.controller.view().is_first_time);
}

#[tokio::test]
async fn finished_without_winner_on_load_redirects_without_publishing() {
    let store = store_with(json!({ "status": "FINISHED", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    let mut harness = Harness::start(store, IdentityHandle::resolved(ana()));

    harness.wait_for("loader to finish", |v| !v.is_loading).await;
    settle().await;

    assert!(harness.controller.view().snapshot.is_none());
    let events = harness.drain_events();
    assert!(events.contains(&UiEvent::Navigate(Destination::Home)));
    assert!(events.contains(&UiEvent::Notify(Notification::match_finished())));
}

#[tokio::test]
async fn missing_match_redirects_with_not_found() {
    let mut harness = Harness::start(InMemorySessionStore::new(), IdentityHandle::resolved(ana()));

    harness.wait_for("loader to finish", |v| !v.is_loading).await;

    assert!(harness.controller.view().snapshot.is_none());
    assert_eq!(
        harness.drain_events(),
        vec![
            UiEvent::Navigate(Destination::Home),
            UiEvent::Notify(Notification::match_not_found()),
        ]
    );
}

#[tokio::test]
async fn transport_failure_looks_like_not_found() {
    let store = store_with(json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    store.fail_next_fetch("connection reset");
    store.hold_fetches();
    let mut harness = Harness::start(store, IdentityHandle::resolved(ana()));

    // The stream still publishes while the fetch is failing.
    harness.wait_for("stream snapshot", |v| v.snapshot.is_some()).await;
    harness.store.release_fetches();
    settle().await;

    assert_eq!(
        harness.drain_events(),
        vec![
            UiEvent::Navigate(Destination::Home),
            UiEvent::Notify(Notification::match_not_found()),
        ]
    );
}

#[tokio::test]
async fn finished_without_winner_on_stream_is_skipped_until_winner_arrives() {
    let users = json!([{ "id": "u1", "name": "Ana" }]);
    let store = store_with(json!({ "status": "ACTIVE", "users": users })).await;
    let mut harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("active snapshot", |v| v.snapshot.is_some()).await;
    settle().await;
    harness.drain_events();

    harness
        .store
        .put(MATCH_ID, json!({ "status": "FINISHED", "users": users }))
        .await;
    settle().await;

    assert_eq!(
        harness.controller.view().snapshot.unwrap().status,
        MatchStatus::Active
    );
    assert_eq!(
        harness.drain_events(),
        vec![
            UiEvent::Navigate(Destination::Home),
            UiEvent::Notify(Notification::match_finished()),
        ]
    );

    harness
        .store
        .put(
            MATCH_ID,
            json!({ "status": "FINISHED", "users": users, "winner": { "id": "u1", "name": "Ana" } }),
        )
        .await;
    let view = harness
        .wait_for("finished snapshot", |v| {
            v.snapshot
                .as_ref()
                .is_some_and(|game| game.status == MatchStatus::Finished)
        })
        .await;
    assert_eq!(view.snapshot.unwrap().winner.unwrap().id, "u1");
}

#[tokio::test]
async fn deleted_match_delivery_is_inert() {
    let store = store_with(json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    let mut harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;
    settle().await;

    harness.store.remove(MATCH_ID).await;
    settle().await;

    assert!(harness.controller.view().snapshot.is_some());
    assert!(harness.drain_events().is_empty());
}

#[tokio::test]
async fn own_message_does_not_set_unread() {
    let users = json!([{ "id": "u1", "name": "Ana" }]);
    let store = store_with(json!({ "status": "ACTIVE", "users": users, "messages": [] })).await;
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;

    harness
        .store
        .put(
            MATCH_ID,
            json!({ "status": "ACTIVE", "users": users, "messages": [message("Bo", "hey")] }),
        )
        .await;
    harness.wait_for("unread", |v| v.has_new_messages).await;
    harness.controller.clear_new_messages();
    assert!(!harness.controller.view().has_new_messages);

    harness
        .store
        .put(
            MATCH_ID,
            json!({ "status": "ACTIVE", "users": users, "messages": [message("Bo", "hey"), message("Ana", "hello")] }),
        )
        .await;
    harness
        .wait_for("two messages", |v| {
            v.snapshot.as_ref().is_some_and(|game| game.messages.len() == 2)
        })
        .await;
    assert!(!harness.controller.view().has_new_messages);

    harness
        .store
        .put(
            MATCH_ID,
            json!({ "status": "ACTIVE", "users": users, "messages": [message("Bo", "hey"), message("Ana", "hello"), message("Bo", "sup")] }),
        )
        .await;
    harness.wait_for("unread again", |v| v.has_new_messages).await;
}

#[tokio::test]
async fn own_deck_clears_first_time_flag() {
    let store = store_with(json!({ "status": "WAITING", "users": [] })).await;
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("first time", |v| v.is_first_time).await;

    let round_without_mine = json!({
        "status": "ACTIVE",
        "users": [{ "id": "u1", "name": "u1" }],
        "actualRound": { "number": 1, "decks": [{ "user": { "uid": "u2", "name": "Bo" } }], "answers": [] }
    });
    harness.store.put(MATCH_ID, round_without_mine).await;
    harness
        .wait_for("active snapshot", |v| {
            v.snapshot
                .as_ref()
                .is_some_and(|game| game.status == MatchStatus::Active)
        })
        .await;
    assert!(harness.controller.view().is_first_time);

    let round_with_mine = json!({
        "status": "ACTIVE",
        "users": [{ "id": "u1", "name": "u1" }],
        "actualRound": { "number": 1, "decks": [{ "user": { "uid": "u1", "name": "Ana" } }], "answers": [] }
    });
    harness.store.put(MATCH_ID, round_with_mine).await;
    harness.wait_for("first time cleared", |v| !v.is_first_time).await;
}

fn active_round_with_answers() -> Value {
    json!({
        "status": "ACTIVE",
        "users": [{ "id": "u1", "name": "Ana" }],
        "actualRound": {
            "number": 1,
            "decks": [],
            "answers": [{ "userId": "u1", "card": "c1" }, { "userId": "u2", "card": "c2" }]
        }
    })
}

#[tokio::test]
async fn next_round_resets_answers_before_command_resolves() {
    let store = store_with(active_round_with_answers()).await;
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;

    harness.store.hold_rounds();
    let advance = harness.controller.next_round();
    tokio::pin!(advance);
    tokio::select! {
        _ = &mut advance => panic!("round command should still be held"),
        _ = settle() => {}
    }

    let view = harness.controller.view();
    let round = view.snapshot.as_ref().unwrap().actual_round.as_ref().unwrap();
    assert!(round.answers.is_empty());
    assert_eq!(round.number, 1);
    assert!(view.loading_next);
    assert!(view.round_pending);

    harness.store.release_rounds();
    advance.await;

    let view = harness
        .wait_for("round 2", |v| {
            v.snapshot
                .as_ref()
                .and_then(|game| game.actual_round.as_ref())
                .is_some_and(|round| round.number == 2)
        })
        .await;
    assert!(!view.loading_next);
    assert!(!view.round_pending);
}

#[tokio::test]
async fn failed_round_notifies_with_fallback_message() {
    let store = store_with(active_round_with_answers()).await;
    let mut harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;
    settle().await;
    harness.drain_events();

    harness.store.fail_next_round(None);
    harness.controller.next_round().await;

    assert!(!harness.controller.view().loading_next);
    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        UiEvent::Notify(notification) => {
            assert_eq!(notification.severity, Severity::Error);
            assert_eq!(
                notification.description,
                "Could not load the round, reload the page."
            );
        }
        other => panic!("unexpected event {other:?}"),
    }

    harness.store.fail_next_round(Some("match is over"));
    harness.controller.next_round().await;
    assert_eq!(
        harness.drain_events(),
        vec![UiEvent::Notify(Notification::round_failed(
            "match is over".to_owned()
        ))]
    );
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_round_reset_warns_after_timeout() {
    let store = store_with(active_round_with_answers()).await;
    let config = SyncConfig {
        round_confirm_timeout: Duration::from_secs(5),
        ..SyncConfig::default()
    };
    let mut harness = Harness::start_with(store, IdentityHandle::resolved(ana()), config);
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;
    settle().await;
    harness.drain_events();

    // The command stays in flight, so no delivery confirms the reset.
    harness.store.hold_rounds();
    let next = harness.controller.next_round();
    tokio::pin!(next);
    assert!(tokio::time::timeout(Duration::from_millis(10), &mut next)
        .await
        .is_err());
    assert!(harness.controller.view().round_pending);

    tokio::time::sleep(Duration::from_secs(6)).await;
    let events = drain(&mut harness.events);
    assert!(events.contains(&UiEvent::Notify(Notification::round_still_syncing())));

    harness.store.release_rounds();
    next.await;
}

#[tokio::test(start_paused = true)]
async fn rejected_round_drops_the_pending_reset() {
    let store = store_with(active_round_with_answers()).await;
    let config = SyncConfig {
        round_confirm_timeout: Duration::from_secs(5),
        ..SyncConfig::default()
    };
    let mut harness = Harness::start_with(store, IdentityHandle::resolved(ana()), config);
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;
    settle().await;
    harness.drain_events();

    harness.store.fail_next_round(Some("busy"));
    harness.controller.next_round().await;
    let view = harness.controller.view();
    assert!(!view.round_pending);
    assert!(view
        .snapshot
        .and_then(|game| game.actual_round)
        .is_some_and(|round| round.answers.is_empty()));

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(
        harness.drain_events(),
        vec![UiEvent::Notify(Notification::round_failed("busy".to_owned()))]
    );
}

#[tokio::test(start_paused = true)]
async fn confirmed_round_reset_does_not_warn() {
    let store = store_with(active_round_with_answers()).await;
    let config = SyncConfig {
        round_confirm_timeout: Duration::from_secs(5),
        ..SyncConfig::default()
    };
    let mut harness = Harness::start_with(store, IdentityHandle::resolved(ana()), config);
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;

    harness.controller.next_round().await;
    harness.wait_for("confirmation", |v| !v.round_pending).await;

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(!harness
        .drain_events()
        .contains(&UiEvent::Notify(Notification::round_still_syncing())));
}

#[tokio::test]
async fn loading_is_true_at_start_and_cleared_by_first_delivery() {
    let store = store_with(json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    store.hold_fetches();
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    assert!(harness.controller.view().is_loading);

    // Fetch is still held, so only the stream can have cleared it.
    harness.wait_for("stream delivery", |v| !v.is_loading).await;
    assert!(harness.controller.view().snapshot.is_some());

    harness.store.release_fetches();
    settle().await;
    assert!(!harness.controller.view().is_loading);
}

#[tokio::test]
async fn stale_load_never_overwrites_streamed_snapshot() {
    let users = json!([{ "id": "u1", "name": "Ana" }]);
    let store = store_with(json!({ "status": "WAITING", "users": users })).await;
    store.hold_fetches();
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("waiting snapshot", |v| v.snapshot.is_some()).await;

    harness
        .store
        .put(MATCH_ID, json!({ "status": "ACTIVE", "users": users }))
        .await;
    harness
        .wait_for("active snapshot", |v| {
            v.snapshot
                .as_ref()
                .is_some_and(|game| game.status == MatchStatus::Active)
        })
        .await;

    // The held fetch captured the WAITING record.
    harness.store.release_fetches();
    settle().await;

    let game = harness.controller.view().snapshot.unwrap();
    assert_eq!(game.status, MatchStatus::Active);
    assert_eq!(game.revision, 2);
}

#[tokio::test]
async fn loader_runs_once_per_activation_and_again_on_reload() {
    let users = json!([{ "id": "u1", "name": "Ana" }]);
    let store = store_with(json!({ "status": "ACTIVE", "users": users })).await;
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;

    for text in ["a", "b", "c"] {
        harness
            .store
            .put(
                MATCH_ID,
                json!({ "status": "ACTIVE", "users": users, "messages": [message("Bo", text)] }),
            )
            .await;
    }
    settle().await;
    assert_eq!(harness.store.fetch_calls(), 1);

    harness.controller.reload();
    assert!(harness.controller.view().is_loading);
    harness.wait_for("reload to finish", |v| !v.is_loading).await;
    assert_eq!(harness.store.fetch_calls(), 2);
    assert_eq!(harness.store.subscribe_calls(), 1);
}

#[tokio::test]
async fn nothing_runs_until_identity_resolves() {
    let store = store_with(json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    let harness = Harness::start(store, IdentityHandle::unresolved());
    settle().await;

    assert_eq!(harness.store.fetch_calls(), 0);
    assert_eq!(harness.store.subscribe_calls(), 0);
    assert!(harness.controller.view().is_loading);

    harness.identity.resolve(ana());
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;
    assert_eq!(harness.store.fetch_calls(), 1);
    assert_eq!(harness.store.subscribe_calls(), 1);
}

#[tokio::test]
async fn identity_change_resubscribes_without_reloading() {
    let store = store_with(json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;

    harness.identity.resolve(Actor::new("u2", "Bo"));
    settle().await;

    assert_eq!(harness.store.subscribe_calls(), 2);
    assert_eq!(harness.store.unsubscribe_calls(), 1);
    assert_eq!(harness.store.fetch_calls(), 1);
}

#[tokio::test]
async fn shutdown_twice_unsubscribes_once_and_clears_loading() {
    let store = store_with(json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    store.hold_fetches();
    let mut harness = Harness::start(store, IdentityHandle::resolved(ana()));
    settle().await;

    harness.controller.shutdown();
    harness.controller.shutdown();
    settle().await;

    assert_eq!(harness.store.subscribe_calls(), 1);
    assert_eq!(harness.store.unsubscribe_calls(), 1);
    assert!(!harness.controller.view().is_loading);
}

#[tokio::test]
async fn results_after_teardown_are_ignored() {
    let store = InMemorySessionStore::new();
    store.hold_fetches();
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    settle().await;

    let Harness {
        store,
        mut events,
        controller,
        ..
    } = harness;
    controller.close().await;

    // The missing match would normally redirect.
    store.release_fetches();
    settle().await;

    assert!(events.try_recv().is_err());
    assert_eq!(store.unsubscribe_calls(), 1);
}

#[tokio::test]
async fn switching_match_tears_down_the_old_subscription() {
    let store = store_with(json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    store
        .put("other", json!({ "status": "WAITING", "users": [{ "id": "u1", "name": "Ana" }] }))
        .await;
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;

    let Harness {
        store, controller, ..
    } = harness;
    let controller = controller.switch_match("other");
    assert_eq!(controller.match_id(), "other");

    let mut rx = controller.watch();
    let view = tokio::time::timeout(
        Duration::from_secs(2),
        rx.wait_for(|v| v.snapshot.is_some()),
    )
    .await
    .expect("other match never arrived")
    .expect("controller view closed")
    .clone();
    assert_eq!(view.snapshot.unwrap().id, "other");
    settle().await;
    assert_eq!(store.unsubscribe_calls(), 1);
    assert_eq!(store.subscribe_calls(), 2);
}

#[tokio::test]
async fn empty_record_on_load_redirects_as_finished() {
    let store = store_with(json!({})).await;
    let mut harness = Harness::start(store, IdentityHandle::resolved(ana()));

    harness.wait_for("loading cleared", |v| !v.is_loading).await;
    settle().await;

    assert_eq!(
        harness.drain_events(),
        vec![
            UiEvent::Navigate(Destination::Home),
            UiEvent::Notify(Notification::match_finished()),
        ]
    );
    assert!(harness.controller.view().snapshot.is_none());
    assert!(harness.store.join_calls().is_empty());
}

#[tokio::test]
async fn malformed_delivery_keeps_previous_snapshot() {
    let store = store_with(json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    let mut harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness
        .wait_for("streamed snapshot", |v| !v.is_loading && v.snapshot.is_some())
        .await;
    settle().await;
    harness.drain_events();

    harness
        .store
        .put(MATCH_ID, json!({ "status": "PAUSED", "users": [] }))
        .await;
    settle().await;

    let game = harness.controller.view().snapshot.unwrap();
    assert_eq!(game.status, MatchStatus::Active);
    assert!(game.has_participant("u1"));
    assert!(harness.drain_events().is_empty());
}

/// Never finishes subscribing.
struct StalledSubscribe(Arc<InMemorySessionStore>);

#[async_trait]
impl SessionStore for StalledSubscribe {
    async fn fetch_once(&self, match_id: &str) -> Result<Option<RawMatch>, StoreError> {
        self.0.fetch_once(match_id).await
    }

    async fn subscribe(&self, _match_id: &str) -> Result<Subscription, StoreError> {
        std::future::pending().await
    }

    async fn add_participant(&self, match_id: &str, actor_id: &str) -> Result<(), StoreError> {
        self.0.add_participant(match_id, actor_id).await
    }

    async fn start_new_round(&self, match_id: &str) -> Result<(), StoreError> {
        self.0.start_new_round(match_id).await
    }
}

#[tokio::test]
async fn close_returns_while_subscribe_is_pending() {
    let store = store_with(json!({ "status": "ACTIVE", "users": [{ "id": "u1", "name": "Ana" }] })).await;
    let (ui, _events) = UiChannel::new();
    let ui = Arc::new(ui);
    let deps = Collaborators {
        store: Arc::new(StalledSubscribe(store)),
        normalizer: Arc::new(JsonNormalizer),
        navigator: ui.clone(),
        notifier: ui,
        identity: Arc::new(IdentityHandle::resolved(ana())),
    };
    let controller = MatchController::start(MATCH_ID, deps, SyncConfig::default());
    settle().await;

    let mut view = controller.watch();
    tokio::time::timeout(Duration::from_secs(2), controller.close())
        .await
        .expect("close waited on the pending subscribe");
    assert!(!view.borrow_and_update().is_loading);
}

#[tokio::test]
async fn round_in_flight_leaves_the_caller_free_to_serve_other_inputs() {
    let store = store_with(active_round_with_answers()).await;
    let harness = Harness::start(store, IdentityHandle::resolved(ana()));
    harness.wait_for("snapshot", |v| v.snapshot.is_some()).await;
    let mut views = harness.controller.watch();
    views.borrow_and_update();

    harness.store.hold_rounds();
    let mut round: Option<LocalBoxFuture<'_, ()>> =
        Some(harness.controller.next_round().boxed_local());
    let mut saw_loading_next = false;

    for _ in 0..3 {
        tokio::select! {
            _ = async { if let Some(round) = round.as_mut() { round.await } } => {
                panic!("round command should still be held");
            }
            changed = views.changed() => {
                changed.unwrap();
                saw_loading_next |= views.borrow_and_update().loading_next;
                harness.controller.clear_new_messages();
            }
            _ = settle() => {}
        }
    }
    assert!(saw_loading_next);

    harness.store.release_rounds();
    if let Some(round) = round.take() {
        round.await;
    }
    assert!(!harness.controller.view().loading_next);
}
