use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
pub struct SubscribeMatchMessageData<'a> {
    #[serde(rename = "matchId")]
    pub match_id: &'a str,
    pub token: &'a str,
}

#[derive(Serialize)]
pub struct SubscribeMatchMessage<'a> {
    #[serde(rename = "requestType")]
    pub msg_type: &'a str,
    pub data: SubscribeMatchMessageData<'a>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "requestType")]
pub enum StreamFrame {
    #[serde(rename = "MATCH_SNAPSHOT")]
    MatchSnapshot {
        /// Absent when the server only streams the subscribed match.
        #[serde(rename = "matchId", default)]
        match_id: Option<String>,
        data: Value,
    },
    #[serde(rename = "MATCH_DELETED")]
    MatchDeleted,
}
