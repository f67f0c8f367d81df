use thiserror::Error;

use crate::models::events::Notification;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
    /// The remote authority refused the command (e.g. match not found).
    #[error("rejected by session store{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Rejected { message: Option<String> },
    #[error("session store connection closed")]
    Closed,
}

impl StoreError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: Some(message.into()),
        }
    }

    /// Message fit for a user, if the failure carries one.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Rejected { message } => message.clone().filter(|m| !m.trim().is_empty()),
            Self::Transport(_) | Self::Closed => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("malformed match record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Why a load did not publish a snapshot.
///
/// Every variant ends in the same redirect; the variants only differ in
/// what gets logged and which notification is shown.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("match {0} does not exist")]
    NotFound(String),
    #[error("match {0} has no fields")]
    Empty(String),
    #[error("match {0} finished without a winner")]
    TerminalInvalid(String),
    #[error("failed to fetch match: {0}")]
    Transport(#[source] StoreError),
    #[error("failed to normalize match: {0}")]
    Malformed(#[from] NormalizeError),
    #[error("failed to join match: {0}")]
    Join(#[source] StoreError),
}

impl LoadError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Empty(_) => "empty",
            Self::TerminalInvalid(_) => "terminal_invalid",
            Self::Transport(_) => "transport",
            Self::Malformed(_) => "malformed",
            Self::Join(_) => "join",
        }
    }

    /// Failures not caused by the match itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Malformed(_) | Self::Join(_))
    }

    pub fn notification(&self) -> Notification {
        match self {
            Self::Empty(_) | Self::TerminalInvalid(_) => Notification::match_finished(),
            _ => Notification::match_not_found(),
        }
    }
}
