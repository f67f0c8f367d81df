use serde::{Deserialize, Serialize};

/// The signed-in user driving this controller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Chat messages only carry the author's display name, so ownership is
    /// decided on that.
    pub fn authored(&self, user_name: &str) -> bool {
        self.display_name == user_name
    }
}
