//! In-process [`SessionStore`] used by the demo mode and the tests.
//!
//! Every write bumps the record's `revision` and is pushed to all live
//! subscriptions. A fresh subscription first receives the current state,
//! the way document streams usually behave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, watch};

use crate::collaborators::{SessionStore, Subscription};
use crate::config::DEFAULT_DELIVERY_BUFFER;
use crate::error::StoreError;
use crate::models::record::{Delivery, RawMatch};

#[derive(Default)]
struct StoreState {
    matches: HashMap<String, RawMatch>,
    revisions: HashMap<String, u64>,
    subscribers: HashMap<String, Vec<(u64, mpsc::Sender<Delivery>)>>,
    next_subscriber: u64,
    fetch_calls: usize,
    join_calls: Vec<(String, String)>,
    round_calls: usize,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
    fetch_failure: Option<String>,
    round_failure: Option<Option<String>>,
}

/// Blocks callers while closed.
struct Gate(watch::Sender<bool>);

impl Gate {
    fn new() -> Self {
        Self(watch::Sender::new(true))
    }

    fn set(&self, open: bool) {
        self.0.send_replace(open);
    }

    async fn pass(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|open| *open).await.map(|_| ());
    }
}

pub struct InMemorySessionStore {
    state: Arc<Mutex<StoreState>>,
    fetch_gate: Gate,
    round_gate: Gate,
    delivery_buffer: usize,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            fetch_gate: Gate::new(),
            round_gate: Gate::new(),
            delivery_buffer: DEFAULT_DELIVERY_BUFFER,
        }
    }
}

fn lock(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemorySessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Like [`Self::new`], with room for `delivery_buffer` undelivered
    /// snapshots per subscription.
    pub fn with_buffer(delivery_buffer: usize) -> Arc<Self> {
        Arc::new(Self {
            delivery_buffer: delivery_buffer.max(1),
            ..Self::default()
        })
    }

    /// Stores `value` as the match record and pushes it to subscribers.
    /// Non-object values are stored as an empty record.
    pub async fn put(&self, match_id: &str, value: Value) {
        let record = RawMatch::from_value(value).unwrap_or_default();
        self.write(match_id, record).await;
    }

    /// Deletes the match; subscribers receive [`Delivery::Missing`].
    pub async fn remove(&self, match_id: &str) {
        let senders = {
            let mut state = lock(&self.state);
            state.matches.remove(match_id);
            Self::senders(&state, match_id)
        };
        Self::broadcast(senders, Delivery::Missing).await;
    }

    /// Current record, if any.
    pub fn get(&self, match_id: &str) -> Option<RawMatch> {
        lock(&self.state).matches.get(match_id).cloned()
    }

    /// Holds every `fetch_once` until [`Self::release_fetches`]. The record
    /// returned is the one present when the fetch started.
    pub fn hold_fetches(&self) {
        self.fetch_gate.set(false);
    }

    pub fn release_fetches(&self) {
        self.fetch_gate.set(true);
    }

    /// Holds every `start_new_round` until [`Self::release_rounds`].
    pub fn hold_rounds(&self) {
        self.round_gate.set(false);
    }

    pub fn release_rounds(&self) {
        self.round_gate.set(true);
    }

    /// Makes the next fetch fail with a transport error.
    pub fn fail_next_fetch(&self, message: &str) {
        lock(&self.state).fetch_failure = Some(message.to_owned());
    }

    /// Makes the next `start_new_round` get rejected with `message`.
    pub fn fail_next_round(&self, message: Option<&str>) {
        lock(&self.state).round_failure = Some(message.map(str::to_owned));
    }

    pub fn fetch_calls(&self) -> usize {
        lock(&self.state).fetch_calls
    }

    pub fn join_calls(&self) -> Vec<(String, String)> {
        lock(&self.state).join_calls.clone()
    }

    pub fn round_calls(&self) -> usize {
        lock(&self.state).round_calls
    }

    pub fn subscribe_calls(&self) -> usize {
        lock(&self.state).subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        lock(&self.state).unsubscribe_calls
    }

    async fn write(&self, match_id: &str, mut record: RawMatch) {
        let (senders, delivery) = {
            let mut state = lock(&self.state);
            let revision = state.revisions.entry(match_id.to_owned()).or_default();
            *revision += 1;
            if !record.is_empty() {
                record.0.insert("revision".to_owned(), json!(*revision));
            }
            state.matches.insert(match_id.to_owned(), record.clone());
            let delivery = Delivery::Record {
                id: match_id.to_owned(),
                data: record,
            };
            (Self::senders(&state, match_id), delivery)
        };
        Self::broadcast(senders, delivery).await;
    }

    fn senders(state: &StoreState, match_id: &str) -> Vec<mpsc::Sender<Delivery>> {
        state
            .subscribers
            .get(match_id)
            .map(|subs| subs.iter().map(|(_, tx)| tx.clone()).collect())
            .unwrap_or_default()
    }

    async fn broadcast(senders: Vec<mpsc::Sender<Delivery>>, delivery: Delivery) {
        for sender in senders {
            if sender.send(delivery.clone()).await.is_err() {
                debug!("Skipping closed subscriber");
            }
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn fetch_once(&self, match_id: &str) -> Result<Option<RawMatch>, StoreError> {
        let (record, failure) = {
            let mut state = lock(&self.state);
            state.fetch_calls += 1;
            (state.matches.get(match_id).cloned(), state.fetch_failure.take())
        };
        self.fetch_gate.pass().await;

        match failure {
            Some(message) => Err(StoreError::Transport(anyhow::anyhow!(message))),
            None => Ok(record),
        }
    }

    async fn subscribe(&self, match_id: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(self.delivery_buffer);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        {
            let mut state = lock(&self.state);
            state.subscribe_calls += 1;
            let key = state.next_subscriber;
            state.next_subscriber += 1;
            state
                .subscribers
                .entry(match_id.to_owned())
                .or_default()
                .push((key, tx.clone()));

            let shared = Arc::clone(&self.state);
            let owned_id = match_id.to_owned();
            tokio::spawn(async move {
                // Either an explicit unsubscribe or a dropped handle ends it.
                let _ = shutdown_rx.await;
                let mut state = lock(&shared);
                state.unsubscribe_calls += 1;
                if let Some(subs) = state.subscribers.get_mut(&owned_id) {
                    subs.retain(|(k, _)| *k != key);
                }
            });

            let initial = match state.matches.get(match_id) {
                Some(record) => Delivery::Record {
                    id: match_id.to_owned(),
                    data: record.clone(),
                },
                None => Delivery::Missing,
            };
            // Queued under the lock so no later write can overtake it.
            if tx.try_send(initial).is_err() {
                warn!("Could not queue the initial delivery for {}", match_id);
            }
        }

        Ok(Subscription::new(rx, shutdown_tx))
    }

    async fn add_participant(&self, match_id: &str, actor_id: &str) -> Result<(), StoreError> {
        let updated = {
            let mut state = lock(&self.state);
            state
                .join_calls
                .push((match_id.to_owned(), actor_id.to_owned()));
            let Some(record) = state.matches.get(match_id) else {
                return Err(StoreError::rejected("match not found"));
            };

            let mut record = record.clone();
            let users = record
                .0
                .entry("users")
                .or_insert_with(|| Value::Array(Vec::new()));
            match users {
                Value::Array(users) => {
                    if users.iter().any(|u| u["id"] == actor_id) {
                        None
                    } else {
                        users.push(json!({ "id": actor_id, "name": actor_id }));
                        Some(record)
                    }
                }
                _ => return Err(StoreError::rejected("match users are malformed")),
            }
        };

        if let Some(record) = updated {
            self.write(match_id, record).await;
        }
        Ok(())
    }

    async fn start_new_round(&self, match_id: &str) -> Result<(), StoreError> {
        lock(&self.state).round_calls += 1;
        self.round_gate.pass().await;

        let record = {
            let mut state = lock(&self.state);
            if let Some(message) = state.round_failure.take() {
                return Err(StoreError::Rejected { message });
            }
            let Some(record) = state.matches.get(match_id) else {
                return Err(StoreError::rejected("match not found"));
            };

            let mut record = record.clone();
            let number = record
                .0
                .get("actualRound")
                .and_then(|round| round["number"].as_u64())
                .unwrap_or(0)
                + 1;
            record.0.insert("status".to_owned(), json!("ACTIVE"));
            record.0.insert(
                "actualRound".to_owned(),
                json!({ "number": number, "decks": [], "answers": [] }),
            );
            record
        };

        self.write(match_id, record).await;
        Ok(())
    }
}
