//! Session store backed by the match HTTP API and its websocket stream.

pub mod matches;

use async_trait::async_trait;
use reqwest::Client;

use crate::collaborators::{SessionStore, Subscription};
use crate::config::ClientConfig;
use crate::error::StoreError;
use crate::models::record::RawMatch;
use crate::websocket::run_match_stream;

pub struct HttpSessionStore {
    client: Client,
    base_url: String,
    ws_url: String,
    token: String,
    delivery_buffer: usize,
}

impl HttpSessionStore {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            ws_url: config.ws_url.clone(),
            token: config.token.clone(),
            delivery_buffer: config.sync.delivery_buffer,
        }
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn fetch_once(&self, match_id: &str) -> Result<Option<RawMatch>, StoreError> {
        Ok(matches::get_match(&self.client, &self.base_url, match_id, &self.token).await?)
    }

    async fn subscribe(&self, match_id: &str) -> Result<Subscription, StoreError> {
        Ok(run_match_stream(&self.ws_url, match_id, &self.token, self.delivery_buffer).await?)
    }

    async fn add_participant(&self, match_id: &str, actor_id: &str) -> Result<(), StoreError> {
        matches::add_user_to_match(&self.client, &self.base_url, match_id, actor_id, &self.token)
            .await
    }

    async fn start_new_round(&self, match_id: &str) -> Result<(), StoreError> {
        matches::create_new_active_round(&self.client, &self.base_url, match_id, &self.token).await
    }
}
