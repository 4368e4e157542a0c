//! Core configuration supplied by the host.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// User id sent with token registrations (default "anonymous").
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Push refreshed tokens to the sink automatically (default true).
    #[serde(default = "default_sync_on_refresh")]
    pub sync_on_refresh: bool,
    /// Prompt title when a foreground notification has none.
    #[serde(default = "default_fallback_title")]
    pub fallback_title: String,
    /// Prompt body when a foreground notification has none.
    #[serde(default = "default_fallback_body")]
    pub fallback_body: String,
}

fn default_user_id() -> String {
    "anonymous".to_string()
}
fn default_sync_on_refresh() -> bool {
    true
}
fn default_fallback_title() -> String {
    "New notification".to_string()
}
fn default_fallback_body() -> String {
    "You have a new message.".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            sync_on_refresh: default_sync_on_refresh(),
            fallback_title: default_fallback_title(),
            fallback_body: default_fallback_body(),
        }
    }
}
