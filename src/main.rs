use std::sync::Arc;

use std::future::pending;

use anyhow::Result;
use futures_util::future::{FutureExt, LocalBoxFuture};
use log::{info, warn};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use match_sync::api::HttpSessionStore;
use match_sync::bridge::{IdentityHandle, UiChannel};
use match_sync::collaborators::{Collaborators, SessionStore};
use match_sync::config::ClientConfig;
use match_sync::memory::InMemorySessionStore;
use match_sync::models::events::{Notification, Severity, UiEvent};
use match_sync::models::identity::Actor;
use match_sync::normalize::JsonNormalizer;
use match_sync::{MatchController, MatchView};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = ClientConfig::from_env()?;

    let store: Arc<dyn SessionStore> = if config.demo {
        if config.actor.is_none() {
            config.actor = Some(Actor::new("demo-player", "Demo"));
        }
        demo_store(&config.match_id, config.sync.delivery_buffer).await
    } else {
        Arc::new(HttpSessionStore::new(&config))
    };

    let identity = Arc::new(match config.actor.clone() {
        Some(actor) => IdentityHandle::resolved(actor),
        None => IdentityHandle::unresolved(),
    });
    let (ui, mut ui_events) = UiChannel::new();
    let ui = Arc::new(ui);

    let deps = Collaborators {
        store,
        normalizer: Arc::new(JsonNormalizer),
        navigator: ui.clone(),
        notifier: ui,
        identity,
    };
    let controller = MatchController::start(config.match_id.clone(), deps, config.sync.clone());
    let mut view = controller.watch();

    info!("Commands: next, reload, read, quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut round_in_flight: Option<LocalBoxFuture<'_, ()>> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                log_view(&view.borrow_and_update());
            }
            event = ui_events.recv() => match event {
                Some(UiEvent::Navigate(destination)) => {
                    info!("Leaving match, navigating to {:?}", destination);
                    break;
                }
                Some(UiEvent::Notify(notification)) => log_notification(&notification),
                None => break,
            },
            _ = round_finished(&mut round_in_flight) => {
                round_in_flight = None;
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(command) => match command.trim() {
                    "next" if round_in_flight.is_some() => warn!("A new round is already starting"),
                    "next" => round_in_flight = Some(controller.next_round().boxed_local()),
                    "reload" => controller.reload(),
                    "read" => controller.clear_new_messages(),
                    "quit" => break,
                    "" => {}
                    other => warn!("Unknown command: {}", other),
                },
                None => stdin_open = false,
            },
        }
    }

    drop(round_in_flight);
    controller.close().await;
    while let Ok(event) = ui_events.try_recv() {
        if let UiEvent::Notify(notification) = event {
            log_notification(&notification);
        }
    }
    Ok(())
}

async fn round_finished(round: &mut Option<LocalBoxFuture<'_, ()>>) {
    match round {
        Some(round) => round.await,
        None => pending().await,
    }
}

fn log_view(view: &MatchView) {
    match &view.snapshot {
        Some(game) => info!(
            "{} [{:?}] players={} messages={} round={} loading={} first_time={} loading_next={} unread={}",
            game.id,
            game.status,
            game.users.len(),
            game.messages.len(),
            game.actual_round.as_ref().map_or(0, |round| round.number),
            view.is_loading,
            view.is_first_time,
            view.loading_next,
            view.has_new_messages,
        ),
        None => info!("No match yet, loading={}", view.is_loading),
    }
}

fn log_notification(notification: &Notification) {
    match notification.severity {
        Severity::Info => info!("{}: {}", notification.title, notification.description),
        Severity::Warning | Severity::Error => {
            warn!("{}: {}", notification.title, notification.description)
        }
    }
}

async fn demo_store(match_id: &str, delivery_buffer: usize) -> Arc<dyn SessionStore> {
    let store = InMemorySessionStore::with_buffer(delivery_buffer);
    store
        .put(
            match_id,
            json!({
                "status": "ACTIVE",
                "users": [{ "id": "host", "name": "Host" }],
                "actualRound": { "number": 1, "decks": [], "answers": [] },
                "messages": [{ "userName": "Host", "text": "welcome!", "createdAt": 0 }]
            }),
        )
        .await;
    store
}
