//! Chat room payloads and input parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One chat event as published on the room channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub join: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub leave: bool,
}

impl ChatEvent {
    pub fn joined(user: &str) -> Self {
        Self {
            user: user.to_string(),
            chat: Some(format!("{user} has joined")),
            join: true,
            ..Self::default()
        }
    }

    pub fn left(user: &str) -> Self {
        Self {
            user: user.to_string(),
            chat: Some(format!("{user} has left")),
            leave: true,
            ..Self::default()
        }
    }

    pub fn said(user: &str, text: &str) -> Self {
        Self {
            user: user.to_string(),
            chat: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Parse a delivered payload; `None` for anything that is not a chat
    /// event.
    pub fn from_data(data: &Value) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }

    /// One terminal line.
    pub fn render(&self) -> String {
        let text = self.chat.as_deref().unwrap_or_default();
        if self.join || self.leave {
            format!("* {text}")
        } else {
            format!("{}: {text}", self.user)
        }
    }
}

/// What a line of input asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Say(String),
    Quit,
    Empty,
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => Self::Empty,
            "/quit" | "/leave" => Self::Quit,
            text => Self::Say(text.to_string()),
        }
    }
}
