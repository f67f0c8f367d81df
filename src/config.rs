use std::time::Duration;

use anyhow::{Context, Result};

use crate::models::identity::Actor;

/// How long an optimistic round reset may wait for the stream before the
/// user is warned.
pub const DEFAULT_ROUND_CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the per-subscription delivery queue.
pub const DEFAULT_DELIVERY_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub round_confirm_timeout: Duration,
    pub delivery_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            round_confirm_timeout: DEFAULT_ROUND_CONFIRM_TIMEOUT,
            delivery_buffer: DEFAULT_DELIVERY_BUFFER,
        }
    }
}

/// Settings for the `match-sync` binary, read from `MATCH_SYNC_*` variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub ws_url: String,
    pub token: String,
    pub match_id: String,
    pub actor: Option<Actor>,
    pub demo: bool,
    pub sync: SyncConfig,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("MATCH_SYNC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let ws_url = lookup("MATCH_SYNC_WS_URL").unwrap_or_else(|| base_url.replace("http", "ws"));
        let match_id = lookup("MATCH_SYNC_MATCH_ID")
            .filter(|id| !id.is_empty())
            .context("MATCH_SYNC_MATCH_ID must be set")?;

        let actor = lookup("MATCH_SYNC_ACTOR_ID")
            .filter(|id| !id.is_empty())
            .map(|id| {
                let name = lookup("MATCH_SYNC_ACTOR_NAME").unwrap_or_else(|| id.clone());
                Actor::new(id, name)
            });

        let mut sync = SyncConfig::default();
        if let Some(secs) = lookup("MATCH_SYNC_CONFIRM_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("invalid MATCH_SYNC_CONFIRM_TIMEOUT_SECS: {secs}"))?;
            sync.round_confirm_timeout = Duration::from_secs(secs);
        }

        Ok(Self {
            base_url,
            ws_url,
            token: lookup("MATCH_SYNC_TOKEN").unwrap_or_default(),
            match_id,
            actor,
            demo: matches!(lookup("MATCH_SYNC_DEMO").as_deref(), Some("1" | "true")),
            sync,
        })
    }
}
