// In crates/api-client/src/types.rs

use reqwest::{Client, Url};

/// The HTTP client for the Control Tower backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// The persistent HTTP client.
    pub http_client: Client,
    /// The base URL of the backend; API paths are appended to it.
    pub base_url: Url,
}

/// Which side of the start/stop pair a control request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotAction {
    Start,
    Stop,
}

impl BotAction {
    pub fn path(&self) -> &'static str {
        match self {
            BotAction::Start => "start",
            BotAction::Stop => "stop",
        }
    }
}
