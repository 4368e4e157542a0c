//! The external messaging transport, as seen by the core.
//! Every call may suspend and every fallible call returns a transport error.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::consent::GrantResult;
use crate::payload::NotificationPayload;

/// Handle for one listener registered with the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Transport call, used in errors and by the loopback transport's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportOp {
    RequestPermission,
    GetToken,
    DeleteToken,
    SubscribeTopic,
    UnsubscribeTopic,
    OnMessage,
    OnNotificationOpened,
    OnTokenRefresh,
    RemoveListener,
    InitialNotification,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("{op:?} failed: {message}")]
    Failed { op: TransportOp, message: String },
    #[error("transport unavailable")]
    Unavailable,
}

impl TransportError {
    pub fn failed(op: TransportOp, message: impl Into<String>) -> Self {
        TransportError::Failed {
            op,
            message: message.into(),
        }
    }
}

/// Push messaging service. Listener registrations feed the given channel until
/// removed with `remove_listener`.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Transport-level authorization (provisional-capable platforms).
    async fn request_permission(&self) -> Result<GrantResult, TransportError>;

    async fn get_token(&self) -> Result<String, TransportError>;

    async fn delete_token(&self) -> Result<(), TransportError>;

    async fn subscribe_to_topic(&self, topic: &str) -> Result<(), TransportError>;

    async fn unsubscribe_from_topic(&self, topic: &str) -> Result<(), TransportError>;

    /// Messages arriving while the app is in the foreground.
    async fn on_message(
        &self,
        tx: UnboundedSender<NotificationPayload>,
    ) -> Result<SubscriptionId, TransportError>;

    /// Notifications tapped while the app was in the background.
    async fn on_notification_opened_app(
        &self,
        tx: UnboundedSender<NotificationPayload>,
    ) -> Result<SubscriptionId, TransportError>;

    /// New token values issued by the service.
    async fn on_token_refresh(
        &self,
        tx: UnboundedSender<String>,
    ) -> Result<SubscriptionId, TransportError>;

    /// Unregister a listener. Unknown ids are ignored.
    async fn remove_listener(&self, id: SubscriptionId);

    /// The notification whose tap launched this process, if any.
    async fn get_initial_notification(
        &self,
    ) -> Result<Option<NotificationPayload>, TransportError>;
}
