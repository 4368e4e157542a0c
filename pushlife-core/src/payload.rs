//! Inbound notification payloads and the tokens that address this device.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Display fields of a notification. Both are optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// A message as delivered by the transport. Immutable once received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(
        default,
        rename = "messageId",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<DisplayFields>,
    /// Custom key/value data (`screen`, `url`, `type`, ...).
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl NotificationPayload {
    /// Parse a payload from transport JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn title(&self) -> Option<&str> {
        self.notification.as_ref().and_then(|n| n.title.as_deref())
    }

    pub fn body(&self) -> Option<&str> {
        self.notification.as_ref().and_then(|n| n.body.as_deref())
    }

    /// Custom data value for `key`, ignoring empty strings.
    pub fn data_value(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Device messaging token. Opaque; only the token manager creates these.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessagingToken(String);

impl MessagingToken {
    pub(crate) fn new(raw: String) -> Self {
        MessagingToken(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for logs: first 8 characters.
    pub fn redacted(&self) -> String {
        let head: String = self.0.chars().take(8).collect();
        format!("{}…", head)
    }
}

impl fmt::Display for MessagingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Debug never prints the full token.
impl fmt::Debug for MessagingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessagingToken").field(&self.redacted()).finish()
    }
}
