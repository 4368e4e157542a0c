//! Server-side token registration sink.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body sent to the token registration endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRegistration {
    pub token: String,
    pub platform: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink rejected registration: status {0}")]
    Rejected(u16),
    #[error("sink unreachable: {0}")]
    Unreachable(String),
}

/// Fire-and-forget: callers log failures and never retry or roll back.
#[async_trait]
pub trait TokenSink: Send + Sync {
    async fn register(&self, registration: &TokenRegistration) -> Result<(), SinkError>;
}
