//! Listener registry: the three delivery-state subscriptions and their teardown.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::payload::NotificationPayload;
use crate::transport::{MessagingTransport, SubscriptionId, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    ForegroundMessage,
    BackgroundTap,
    TokenRefresh,
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("registering {kind:?} listener failed: {source}")]
    Registration {
        kind: ListenerKind,
        source: TransportError,
    },
}

/// Inbound channels, one per delivery kind.
#[derive(Debug)]
pub struct ListenerStreams {
    pub messages: UnboundedReceiver<NotificationPayload>,
    pub taps: UnboundedReceiver<NotificationPayload>,
    pub token_refreshes: UnboundedReceiver<String>,
}

/// The active listener set. Not `Clone`: `teardown` consumes it, so the
/// subscriptions are released at most once.
#[must_use = "listeners stay registered until the handle is torn down"]
pub struct TeardownHandle {
    transport: Arc<dyn MessagingTransport>,
    subscriptions: Vec<(ListenerKind, SubscriptionId)>,
    pump: Option<JoinHandle<()>>,
}

impl TeardownHandle {
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Task consuming the listener streams; stopped on teardown.
    pub(crate) fn attach_pump(&mut self, pump: JoinHandle<()>) {
        self.pump = Some(pump);
    }

    /// Unregister every subscription and stop the event pump.
    pub async fn teardown(mut self) {
        let subscriptions = std::mem::take(&mut self.subscriptions);
        remove_all(self.transport.as_ref(), &subscriptions).await;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        log::info!("notification listeners torn down");
    }
}

/// A handle dropped without `teardown` still stops the pump and releases its
/// subscriptions on the current runtime.
impl Drop for TeardownHandle {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if self.subscriptions.is_empty() {
            return;
        }
        let subscriptions = std::mem::take(&mut self.subscriptions);
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                log::warn!("listener handle dropped without teardown; releasing");
                let transport = self.transport.clone();
                rt.spawn(async move {
                    remove_all(transport.as_ref(), &subscriptions).await;
                });
            }
            Err(_) => log::warn!(
                "listener handle dropped outside a runtime; {} subscriptions leaked",
                subscriptions.len()
            ),
        }
    }
}

impl fmt::Debug for TeardownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeardownHandle")
            .field("subscriptions", &self.subscriptions)
            .field("pump", &self.pump.is_some())
            .finish()
    }
}

async fn remove_all(
    transport: &dyn MessagingTransport,
    subs: &[(ListenerKind, SubscriptionId)],
) {
    for (kind, id) in subs.iter().rev() {
        log::debug!("removing {:?} listener {:?}", kind, id);
        transport.remove_listener(*id).await;
    }
}

pub struct ListenerRegistry {
    transport: Arc<dyn MessagingTransport>,
}

impl ListenerRegistry {
    pub fn new(transport: Arc<dyn MessagingTransport>) -> Self {
        Self { transport }
    }

    /// Register the foreground-message, background-tap and token-refresh
    /// listeners. Call once per lifecycle; a second call without teardown
    /// registers duplicates. On failure nothing stays registered.
    pub async fn start(&self) -> Result<(TeardownHandle, ListenerStreams), ListenerError> {
        let (msg_tx, messages) = mpsc::unbounded_channel();
        let (tap_tx, taps) = mpsc::unbounded_channel();
        let (refresh_tx, token_refreshes) = mpsc::unbounded_channel();
        let mut subscriptions = Vec::with_capacity(3);

        let steps = [
            ListenerKind::ForegroundMessage,
            ListenerKind::BackgroundTap,
            ListenerKind::TokenRefresh,
        ];
        for kind in steps {
            let result = match kind {
                ListenerKind::ForegroundMessage => self.transport.on_message(msg_tx.clone()).await,
                ListenerKind::BackgroundTap => {
                    self.transport
                        .on_notification_opened_app(tap_tx.clone())
                        .await
                }
                ListenerKind::TokenRefresh => {
                    self.transport.on_token_refresh(refresh_tx.clone()).await
                }
            };
            match result {
                Ok(id) => subscriptions.push((kind, id)),
                Err(source) => {
                    log::warn!("failed to register {:?} listener: {}", kind, source);
                    remove_all(self.transport.as_ref(), &subscriptions).await;
                    return Err(ListenerError::Registration { kind, source });
                }
            }
        }
        log::info!("notification listeners registered");
        Ok((
            TeardownHandle {
                transport: self.transport.clone(),
                subscriptions,
                pump: None,
            },
            ListenerStreams {
                messages,
                taps,
                token_refreshes,
            },
        ))
    }
}
