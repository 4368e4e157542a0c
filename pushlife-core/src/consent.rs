//! Notification consent: platform policy, consent requests, tracked state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::transport::MessagingTransport;

/// First Android API level with a runtime POST_NOTIFICATIONS permission.
pub const ANDROID_RUNTIME_PERMISSION_API: u32 = 33;

/// Host platform, as far as consent is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "os")]
pub enum Platform {
    Android { api_level: u32 },
    Ios,
    Other,
}

impl Platform {
    pub fn consent_policy(&self) -> ConsentPolicy {
        match self {
            Platform::Android { api_level } if *api_level >= ANDROID_RUNTIME_PERMISSION_API => {
                ConsentPolicy::RuntimePrompt
            }
            Platform::Android { .. } => ConsentPolicy::AutoGrant,
            Platform::Ios => ConsentPolicy::Provisional,
            Platform::Other => ConsentPolicy::AutoGrant,
        }
    }

    /// Name reported to the token sink.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Android { .. } => "android",
            Platform::Ios => "ios",
            Platform::Other => "other",
        }
    }
}

/// How consent is obtained on a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentPolicy {
    /// No consent concept; always granted.
    AutoGrant,
    /// Runtime prompt through the platform consent API.
    RuntimePrompt,
    /// Authorization through the transport; provisional counts as granted.
    Provisional,
}

/// Raw result of a consent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantResult {
    Granted,
    Denied,
    Provisional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsentState {
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl ConsentState {
    pub fn is_granted(self) -> bool {
        self == ConsentState::Granted
    }

    /// Proof of consent for token acquisition, if granted.
    pub fn granted(self) -> Option<ConsentGranted> {
        self.is_granted().then_some(ConsentGranted(()))
    }
}

impl From<GrantResult> for ConsentState {
    fn from(r: GrantResult) -> Self {
        match r {
            GrantResult::Granted | GrantResult::Provisional => ConsentState::Granted,
            GrantResult::Denied => ConsentState::Denied,
        }
    }
}

/// Zero-sized proof that consent was granted. Only `ConsentState::granted` makes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentGranted(());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsentError {
    #[error("consent API unavailable")]
    Unavailable,
    #[error("consent request failed: {0}")]
    Request(String),
}

/// Platform runtime consent prompt (e.g. Android POST_NOTIFICATIONS).
#[async_trait]
pub trait PlatformConsent: Send + Sync {
    async fn request_notifications(&self) -> Result<GrantResult, ConsentError>;
}

/// Requests and tracks notification consent.
pub struct PermissionGate {
    platform: Platform,
    consent: Arc<dyn PlatformConsent>,
    transport: Arc<dyn MessagingTransport>,
    state: watch::Sender<ConsentState>,
}

impl PermissionGate {
    pub fn new(
        platform: Platform,
        consent: Arc<dyn PlatformConsent>,
        transport: Arc<dyn MessagingTransport>,
    ) -> Self {
        let (state, _) = watch::channel(ConsentState::Unknown);
        Self {
            platform,
            consent,
            transport,
            state,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn state(&self) -> ConsentState {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<ConsentState> {
        self.state.subscribe()
    }

    /// Ask the platform for consent. Every call asks again; errors become Denied.
    pub async fn request_permission(&self) -> ConsentState {
        let result = match self.platform.consent_policy() {
            ConsentPolicy::AutoGrant => Ok(GrantResult::Granted),
            ConsentPolicy::RuntimePrompt => self.consent.request_notifications().await,
            ConsentPolicy::Provisional => self
                .transport
                .request_permission()
                .await
                .map_err(|e| ConsentError::Request(e.to_string())),
        };
        let state = match result {
            Ok(r) => {
                let state = ConsentState::from(r);
                if state.is_granted() {
                    log::info!("notification permission granted ({:?})", r);
                } else {
                    log::info!("notification permission rejected");
                }
                state
            }
            Err(e) => {
                log::warn!("notification permission request failed: {}", e);
                ConsentState::Denied
            }
        };
        self.state.send_replace(state);
        state
    }
}
