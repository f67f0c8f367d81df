//! Interfaces the match controller talks to.
//!
//! The controller never knows how matches are stored, how the user is
//! redirected or how notifications are drawn; it only goes through these
//! traits. [`crate::api::HttpSessionStore`] and
//! [`crate::memory::InMemorySessionStore`] implement the store side,
//! [`crate::bridge`] the presentation side.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{NormalizeError, StoreError};
use crate::models::identity::Actor;
use crate::models::match_state::Match;
use crate::models::record::{Delivery, RawMatch};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// One-shot read. `Ok(None)` when the match does not exist.
    async fn fetch_once(&self, match_id: &str) -> Result<Option<RawMatch>, StoreError>;

    /// Starts pushing every change of the match into the returned
    /// subscription until it is unsubscribed.
    async fn subscribe(&self, match_id: &str) -> Result<Subscription, StoreError>;

    /// Must tolerate duplicate calls for the same actor.
    async fn add_participant(&self, match_id: &str, actor_id: &str) -> Result<(), StoreError>;

    async fn start_new_round(&self, match_id: &str) -> Result<(), StoreError>;
}

pub trait Normalizer: Send + Sync {
    fn convert(&self, match_id: &str, raw: RawMatch) -> Result<Match, NormalizeError>;
}

pub trait Navigator: Send + Sync {
    fn go_home(&self);
}

pub trait Notifier: Send + Sync {
    fn show(&self, notification: crate::models::events::Notification);
}

pub trait IdentityProvider: Send + Sync {
    /// Current actor, `None` while authentication is unresolved.
    fn watch(&self) -> watch::Receiver<Option<Actor>>;
}

/// Everything a [`crate::controller::MatchController`] needs from outside.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn SessionStore>,
    pub normalizer: Arc<dyn Normalizer>,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Live feed of deliveries for one match.
///
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    deliveries: mpsc::Receiver<Delivery>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub fn new(deliveries: mpsc::Receiver<Delivery>, shutdown_tx: oneshot::Sender<()>) -> Self {
        Self {
            deliveries,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Next delivery, `None` once the producer is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.deliveries.recv().await
    }

    pub fn is_active(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Tells the producer to stop. Calling it again does nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            log::debug!("Unsubscribing from match stream");
            let _ = shutdown_tx.send(());
            self.deliveries.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
