//! Token manager: acquire, cache, refresh and invalidate the messaging token.

use std::sync::Arc;

use tokio::sync::watch;

use crate::payload::MessagingToken;
use crate::transport::MessagingTransport;

/// Owns the cached token. Callers read clones or watch for changes; only
/// `acquire_token`, `apply_refresh` and `delete_token` mutate it.
pub struct TokenManager {
    transport: Arc<dyn MessagingTransport>,
    current: watch::Sender<Option<MessagingToken>>,
}

impl TokenManager {
    pub fn new(transport: Arc<dyn MessagingTransport>) -> Self {
        let (current, _) = watch::channel(None);
        Self { transport, current }
    }

    pub fn current(&self) -> Option<MessagingToken> {
        self.current.borrow().clone()
    }

    /// Receiver that observes every acquisition, refresh and deletion.
    pub fn watch(&self) -> watch::Receiver<Option<MessagingToken>> {
        self.current.subscribe()
    }

    /// Fetch the token from the transport. Consent is the caller's concern.
    /// On failure the cached value is left as it was and None is returned.
    pub async fn acquire_token(&self) -> Option<MessagingToken> {
        match self.transport.get_token().await {
            Ok(raw) if !raw.is_empty() => {
                let token = MessagingToken::new(raw);
                log::info!("messaging token acquired: {}", token.redacted());
                self.current.send_replace(Some(token.clone()));
                Some(token)
            }
            Ok(_) => {
                log::warn!("transport returned an empty messaging token");
                None
            }
            Err(e) => {
                log::warn!("messaging token error: {}", e);
                None
            }
        }
    }

    /// Replace the cached token with a value issued by the transport.
    pub fn apply_refresh(&self, raw: String) -> MessagingToken {
        let token = MessagingToken::new(raw);
        let old = self.current.send_replace(Some(token.clone()));
        log::info!(
            "messaging token refreshed: {} (was {})",
            token.redacted(),
            old.as_ref().map(|t| t.redacted()).unwrap_or_else(|| "none".into())
        );
        token
    }

    /// Invalidate the registration and clear local state. Safe with no token held.
    pub async fn delete_token(&self) -> bool {
        match self.transport.delete_token().await {
            Ok(()) => {
                self.current.send_replace(None);
                log::info!("messaging token deleted");
                true
            }
            Err(e) => {
                log::warn!("error deleting messaging token: {}", e);
                false
            }
        }
    }
}
