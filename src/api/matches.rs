use anyhow::Result;
use log::{debug, error, info};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::record::RawMatch;

#[derive(Serialize, Debug)]
pub struct AddUserRequest<'a> {
    #[serde(rename = "userId")]
    pub user_id: &'a str,
}

#[derive(Deserialize, Debug, Default)]
pub struct ErrorResponse {
    pub message: Option<String>,
}

pub async fn get_match(
    client: &Client,
    base_url: &str,
    match_id: &str,
    token: &str,
) -> Result<Option<RawMatch>, anyhow::Error> {
    let url = format!("{}/api/matches/{}", base_url, match_id);
    debug!("Fetching match: {}", url);
    let resp = client
        .get(&url)
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await?;

    if resp.status() == StatusCode::NOT_FOUND {
        info!("Match {} not found", match_id);
        return Ok(None);
    }
    if resp.status().is_success() {
        let response = resp.json::<serde_json::Value>().await?;
        info!("Match received successfully");
        Ok(RawMatch::from_value(response))
    } else {
        error!("Failed to get match: {}", resp.status());
        Err(anyhow::anyhow!("Failed to get match: {}", resp.status()))
    }
}

pub async fn add_user_to_match(
    client: &Client,
    base_url: &str,
    match_id: &str,
    user_id: &str,
    token: &str,
) -> Result<(), StoreError> {
    let url = format!("{}/api/matches/{}/users", base_url, match_id);
    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", token))
        .json(&AddUserRequest { user_id })
        .send()
        .await
        .map_err(anyhow::Error::from)?;
    check_command(resp, "add user to match").await
}

pub async fn create_new_active_round(
    client: &Client,
    base_url: &str,
    match_id: &str,
    token: &str,
) -> Result<(), StoreError> {
    let url = format!("{}/api/matches/{}/rounds", base_url, match_id);
    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .map_err(anyhow::Error::from)?;
    check_command(resp, "create new round").await
}

/// Server errors are transport failures; client errors are the server
/// refusing the command, with whatever message it gave.
async fn check_command(resp: reqwest::Response, what: &str) -> Result<(), StoreError> {
    let status = resp.status();
    if status.is_success() {
        info!("{} succeeded", what);
        return Ok(());
    }

    error!("Failed to {}: {}", what, status);
    if status.is_server_error() {
        return Err(anyhow::anyhow!("Failed to {}: {}", what, status).into());
    }
    let body = resp.json::<ErrorResponse>().await.unwrap_or_default();
    Err(StoreError::Rejected {
        message: body.message,
    })
}
