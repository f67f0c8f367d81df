//! Match sync controller.
//!
//! Keeps one local snapshot of a match up to date from two sources: a
//! one-shot load and the store's push stream. A single driver task owns
//! the subscription and applies deliveries one at a time; the loader and
//! round commands run as separate tasks. All of them write through
//! [`Shared::update`], which publishes a fresh [`MatchView`] after every
//! change and ignores writes once the controller is torn down.

mod loader;
mod membership;
mod reconciler;
mod round;
pub mod signals;
mod state;

use std::future::pending;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;

use crate::collaborators::{Collaborators, Subscription};
use crate::config::SyncConfig;
use crate::models::identity::Actor;
use crate::models::record::Delivery;

pub use signals::MatchView;
use state::ControllerState;

pub(crate) struct Shared {
    match_id: String,
    deps: Collaborators,
    config: SyncConfig,
    state: Mutex<ControllerState>,
    view_tx: watch::Sender<MatchView>,
    reload: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies `f` and publishes the resulting view. Returns `None` without
    /// touching anything once the controller is torn down.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ControllerState) -> R) -> Option<R> {
        let mut state = self.lock();
        if !state.live {
            return None;
        }
        let result = f(&mut state);
        self.publish(&state);
        Some(result)
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&ControllerState) -> R) -> R {
        f(&self.lock())
    }

    pub(crate) fn is_live(&self) -> bool {
        self.lock().live
    }

    fn publish(&self, state: &ControllerState) {
        let view = signals::view(state);
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    /// Clears the loading flag one last time and stops accepting writes.
    fn teardown(&self) -> bool {
        let mut state = self.lock();
        if !state.live {
            return false;
        }
        state.is_loading = false;
        self.publish(&state);
        state.live = false;
        true
    }
}

pub struct MatchController {
    shared: Arc<Shared>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    driver: Option<JoinHandle<()>>,
}

impl MatchController {
    /// Starts syncing `match_id`. Must be called inside a tokio runtime.
    pub fn start(match_id: impl Into<String>, deps: Collaborators, config: SyncConfig) -> Self {
        let state = ControllerState::default();
        let (view_tx, _) = watch::channel(signals::view(&state));
        let identity = deps.identity.watch();

        let shared = Arc::new(Shared {
            match_id: match_id.into(),
            deps,
            config,
            state: Mutex::new(state),
            view_tx,
            reload: Notify::new(),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let driver = tokio::spawn(drive(Arc::clone(&shared), identity, shutdown_rx));
        info!("Match controller started for {}", shared.match_id);

        Self {
            shared,
            shutdown_tx: Some(shutdown_tx),
            driver: Some(driver),
        }
    }

    pub fn match_id(&self) -> &str {
        &self.shared.match_id
    }

    pub fn view(&self) -> MatchView {
        self.shared.view_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<MatchView> {
        self.shared.view_tx.subscribe()
    }

    /// Re-enters the loader once, as if the controller had just started.
    pub fn reload(&self) {
        if self.shared.update(ControllerState::arm_loader).is_some() {
            debug!("Reload requested for {}", self.shared.match_id);
            self.shared.reload.notify_one();
        }
    }

    /// Asks the remote authority for a new round, resetting the current
    /// round's answers locally first. Failures are reported through the
    /// notifier.
    pub async fn next_round(&self) {
        round::advance(&self.shared).await;
    }

    pub fn clear_new_messages(&self) {
        self.shared.update(|state| state.has_new_messages = false);
    }

    /// Tears this controller down and starts a fresh one for `match_id`.
    pub fn switch_match(mut self, match_id: impl Into<String>) -> Self {
        let deps = self.shared.deps.clone();
        let config = self.shared.config.clone();
        self.shutdown();
        Self::start(match_id, deps, config)
    }

    /// Stops syncing. Calling it more than once does nothing.
    pub fn shutdown(&mut self) {
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return;
        };
        if self.shared.teardown() {
            info!("Match controller stopped for {}", self.shared.match_id);
        }
        let _ = shutdown_tx.send(());
    }

    /// Shuts down and waits until the subscription has been released.
    pub async fn close(mut self) {
        self.shutdown();
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                error!("Match driver task failed: {}", e);
            }
        }
    }
}

impl Drop for MatchController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn next_delivery(subscription: &mut Option<Subscription>) -> Option<Delivery> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => pending().await,
    }
}

async fn identity_changed(
    identity: &mut Option<watch::Receiver<Option<Actor>>>,
) -> Option<Option<Actor>> {
    let Some(rx) = identity else {
        return pending().await;
    };
    match rx.changed().await {
        Ok(()) => Some(rx.borrow_and_update().clone()),
        Err(_) => None,
    }
}

async fn drive(
    shared: Arc<Shared>,
    identity: watch::Receiver<Option<Actor>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut identity = Some(identity);
    let mut actor = identity
        .as_mut()
        .and_then(|rx| rx.borrow_and_update().clone());
    let mut subscription: Option<Subscription> = None;
    let mut needs_subscription = true;

    loop {
        if let Some(current) = actor.as_ref() {
            loader::trigger(&shared, current);

            if needs_subscription {
                needs_subscription = false;
                let subscribed = tokio::select! {
                    _ = &mut shutdown_rx => break,
                    subscribed = shared.deps.store.subscribe(&shared.match_id) => subscribed,
                };
                match subscribed {
                    Ok(sub) => {
                        debug!("Subscribed to {} as {}", shared.match_id, current.id);
                        subscription = Some(sub);
                    }
                    Err(e) => error!("Failed to subscribe to {}: {}", shared.match_id, e),
                }
                if !shared.is_live() {
                    break;
                }
            }
        }

        tokio::select! {
            _ = &mut shutdown_rx => break,
            changed = identity_changed(&mut identity) => match changed {
                Some(next) if next != actor => {
                    if let Some(mut old) = subscription.take() {
                        old.unsubscribe();
                    }
                    needs_subscription = true;
                    actor = next;
                }
                Some(_) => {}
                None => {
                    debug!("Identity provider went away, keeping current actor");
                    identity = None;
                }
            },
            delivery = next_delivery(&mut subscription) => match (delivery, actor.as_ref()) {
                (Some(delivery), Some(current)) => reconciler::process(&shared, current, delivery),
                (Some(_), None) => {}
                (None, _) => {
                    warn!("Match stream for {} ended", shared.match_id);
                    subscription = None;
                }
            },
            _ = shared.reload.notified() => {
                if subscription.is_none() {
                    needs_subscription = true;
                }
            }
        }
    }

    if let Some(mut subscription) = subscription.take() {
        subscription.unsubscribe();
    }
    debug!("Match driver for {} exited", shared.match_id);
}
