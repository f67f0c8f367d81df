use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "error")]
    Error,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn match_not_found() -> Self {
        Self {
            title: "Match not found".to_owned(),
            description: "We could not find a match with this code.".to_owned(),
            severity: Severity::Info,
        }
    }

    pub fn match_finished() -> Self {
        Self {
            title: "Match finished".to_owned(),
            description: "This match has already finished.".to_owned(),
            severity: Severity::Info,
        }
    }

    pub fn round_failed(description: String) -> Self {
        Self {
            title: "Something went wrong".to_owned(),
            description,
            severity: Severity::Error,
        }
    }

    pub fn round_still_syncing() -> Self {
        Self {
            title: "Round still syncing".to_owned(),
            description: "The new round has not arrived yet, reload the match if this persists."
                .to_owned(),
            severity: Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Home,
}

/// Side effects the controller asks the presentation layer to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Navigate(Destination),
    Notify(Notification),
}
