use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite;

use crate::collaborators::Subscription;
use crate::models::record::{Delivery, RawMatch};
use crate::models::websocket::{StreamFrame, SubscribeMatchMessage, SubscribeMatchMessageData};

pub async fn run_match_stream(
    ws_base_url: &str,
    match_id: &str,
    token: &str,
    buffer: usize,
) -> Result<Subscription, anyhow::Error> {
    // 1. Connect
    let (ws_stream, _) =
        tokio_tungstenite::connect_async(format!("{}/matches?matchId={}", ws_base_url, match_id))
            .await?;
    info!("Match stream connected for {}", match_id);

    // 2. Split into sink and stream
    let (mut sink, mut stream) = ws_stream.split();

    // 3. Ask for this match's snapshots
    let subscribe_message = serde_json::to_string(&SubscribeMatchMessage {
        msg_type: "SUBSCRIBE_MATCH",
        data: SubscribeMatchMessageData { match_id, token },
    })?;
    sink.send(tungstenite::Message::text(subscribe_message))
        .await?;

    // 4. Channels for deliveries and shutdown
    let (sender, receiver) = mpsc::channel(buffer.max(1));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 5. Read loop on its own task
    let subscribed_id = match_id.to_owned();
    tokio::spawn(async move {
        tokio::select! {
            _ = async {
                while let Some(msg) = stream.next().await {
                    let msg = match msg {
                        Ok(msg) => msg,
                        Err(e) => {
                            error!("Match stream error: {}", e);
                            break;
                        }
                    };
                    let Ok(text) = msg.to_text() else {
                        continue;
                    };
                    if text.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StreamFrame>(text) {
                        Ok(frame) => {
                            if sender.send(into_delivery(frame, &subscribed_id)).await.is_err() {
                                debug!("Delivery receiver dropped");
                                break;
                            }
                        }
                        Err(e) => warn!("Received invalid frame: {} ({})", text, e),
                    }
                }
            } => {},

            _ = shutdown_rx => {
                info!("Match stream shutdown requested");
            }
        }

        sink.close().await.ok();
    });

    Ok(Subscription::new(receiver, shutdown_tx))
}

fn into_delivery(frame: StreamFrame, subscribed_id: &str) -> Delivery {
    match frame {
        StreamFrame::MatchSnapshot { match_id, data } => match RawMatch::from_value(data) {
            Some(data) => Delivery::Record {
                id: match_id.unwrap_or_else(|| subscribed_id.to_owned()),
                data,
            },
            None => Delivery::Missing,
        },
        StreamFrame::MatchDeleted => Delivery::Missing,
    }
}
