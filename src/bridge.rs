//! Presentation-side collaborators backed by channels.
//!
//! The controller pushes [`UiEvent`]s into an unbounded channel; whoever
//! renders the match drains the receiver.

use log::warn;
use tokio::sync::{mpsc, watch};

use crate::collaborators::{IdentityProvider, Navigator, Notifier};
use crate::models::events::{Destination, Notification, UiEvent};
use crate::models::identity::Actor;

#[derive(Clone)]
pub struct UiChannel {
    sender: mpsc::UnboundedSender<UiEvent>,
}

impl UiChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn emit(&self, event: UiEvent) {
        if let Err(e) = self.sender.send(event) {
            warn!("UI event dropped, receiver is gone: {:?}", e.0);
        }
    }
}

impl Navigator for UiChannel {
    fn go_home(&self) {
        self.emit(UiEvent::Navigate(Destination::Home));
    }
}

impl Notifier for UiChannel {
    fn show(&self, notification: Notification) {
        self.emit(UiEvent::Notify(notification));
    }
}

/// Identity that can be resolved (or switched) after the controller starts.
pub struct IdentityHandle {
    sender: watch::Sender<Option<Actor>>,
}

impl IdentityHandle {
    pub fn unresolved() -> Self {
        Self {
            sender: watch::Sender::new(None),
        }
    }

    pub fn resolved(actor: Actor) -> Self {
        Self {
            sender: watch::Sender::new(Some(actor)),
        }
    }

    pub fn resolve(&self, actor: Actor) {
        self.sender.send_replace(Some(actor));
    }

    pub fn current(&self) -> Option<Actor> {
        self.sender.borrow().clone()
    }
}

impl IdentityProvider for IdentityHandle {
    fn watch(&self) -> watch::Receiver<Option<Actor>> {
        self.sender.subscribe()
    }
}
