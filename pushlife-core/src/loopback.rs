//! In-process messaging transport. Hosts inject events (foreground messages,
//! taps, token rotation, launch payload); tests also use the call counters and
//! failure injection.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex, MutexGuard};

use crate::consent::GrantResult;
use crate::payload::NotificationPayload;
use crate::transport::{MessagingTransport, SubscriptionId, TransportError, TransportOp};

enum Listener {
    Message(UnboundedSender<NotificationPayload>),
    Opened(UnboundedSender<NotificationPayload>),
    TokenRefresh(UnboundedSender<String>),
}

struct State {
    authorization: GrantResult,
    token: Option<String>,
    topics: HashSet<String>,
    listeners: HashMap<SubscriptionId, Listener>,
    next_id: u64,
    initial: Option<NotificationPayload>,
    calls: HashMap<TransportOp, usize>,
    failing: HashSet<TransportOp>,
}

pub struct LoopbackTransport {
    state: Mutex<State>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                authorization: GrantResult::Granted,
                token: None,
                topics: HashSet::new(),
                listeners: HashMap::new(),
                next_id: 1,
                initial: None,
                calls: HashMap::new(),
                failing: HashSet::new(),
            }),
        }
    }

    /// Result returned by `request_permission`.
    pub async fn set_authorization(&self, result: GrantResult) {
        self.state.lock().await.authorization = result;
    }

    /// Payload reported as the one that launched this process.
    pub async fn set_launch_notification(&self, payload: NotificationPayload) {
        self.state.lock().await.initial = Some(payload);
    }

    /// Make every later call of `op` fail.
    pub async fn fail(&self, op: TransportOp) {
        self.state.lock().await.failing.insert(op);
    }

    pub async fn heal(&self, op: TransportOp) {
        self.state.lock().await.failing.remove(&op);
    }

    /// Number of times `op` was invoked (including failed calls).
    pub async fn calls(&self, op: TransportOp) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    pub async fn active_listeners(&self) -> usize {
        self.state.lock().await.listeners.len()
    }

    pub async fn current_token(&self) -> Option<String> {
        self.state.lock().await.token.clone()
    }

    pub async fn is_subscribed(&self, topic: &str) -> bool {
        self.state.lock().await.topics.contains(topic)
    }

    /// Deliver a message to foreground listeners. Returns listeners reached.
    pub async fn push_foreground(&self, payload: NotificationPayload) -> usize {
        let payload = with_message_id(payload);
        let s = self.state.lock().await;
        let reached = s
            .listeners
            .values()
            .filter_map(|l| match l {
                Listener::Message(tx) => tx.send(payload.clone()).ok(),
                _ => None,
            })
            .count();
        reached
    }

    /// Simulate a tap on a notification while backgrounded.
    pub async fn tap(&self, payload: NotificationPayload) -> usize {
        let payload = with_message_id(payload);
        let s = self.state.lock().await;
        let reached = s
            .listeners
            .values()
            .filter_map(|l| match l {
                Listener::Opened(tx) => tx.send(payload.clone()).ok(),
                _ => None,
            })
            .count();
        reached
    }

    /// Issue a new token and notify refresh listeners.
    pub async fn rotate_token(&self, token: impl Into<String>) -> usize {
        let token = token.into();
        let mut s = self.state.lock().await;
        s.token = Some(token.clone());
        let reached = s
            .listeners
            .values()
            .filter_map(|l| match l {
                Listener::TokenRefresh(tx) => tx.send(token.clone()).ok(),
                _ => None,
            })
            .count();
        reached
    }

    /// Count the call and apply failure injection.
    async fn enter(&self, op: TransportOp) -> Result<MutexGuard<'_, State>, TransportError> {
        let mut s = self.state.lock().await;
        *s.calls.entry(op).or_insert(0) += 1;
        if s.failing.contains(&op) {
            return Err(TransportError::failed(op, "injected failure"));
        }
        Ok(s)
    }

    async fn register(
        &self,
        op: TransportOp,
        listener: Listener,
    ) -> Result<SubscriptionId, TransportError> {
        let mut s = self.enter(op).await?;
        let id = SubscriptionId(s.next_id);
        s.next_id += 1;
        s.listeners.insert(id, listener);
        Ok(id)
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_message_id(mut payload: NotificationPayload) -> NotificationPayload {
    if payload.message_id.is_none() {
        payload.message_id = Some(uuid::Uuid::new_v4().to_string());
    }
    payload
}

#[async_trait]
impl MessagingTransport for LoopbackTransport {
    async fn request_permission(&self) -> Result<GrantResult, TransportError> {
        let s = self.enter(TransportOp::RequestPermission).await?;
        Ok(s.authorization)
    }

    async fn get_token(&self) -> Result<String, TransportError> {
        let mut s = self.enter(TransportOp::GetToken).await?;
        let token = s
            .token
            .get_or_insert_with(|| uuid::Uuid::new_v4().simple().to_string())
            .clone();
        Ok(token)
    }

    async fn delete_token(&self) -> Result<(), TransportError> {
        let mut s = self.enter(TransportOp::DeleteToken).await?;
        s.token = None;
        Ok(())
    }

    async fn subscribe_to_topic(&self, topic: &str) -> Result<(), TransportError> {
        let mut s = self.enter(TransportOp::SubscribeTopic).await?;
        s.topics.insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe_from_topic(&self, topic: &str) -> Result<(), TransportError> {
        let mut s = self.enter(TransportOp::UnsubscribeTopic).await?;
        s.topics.remove(topic);
        Ok(())
    }

    async fn on_message(
        &self,
        tx: UnboundedSender<NotificationPayload>,
    ) -> Result<SubscriptionId, TransportError> {
        self.register(TransportOp::OnMessage, Listener::Message(tx)).await
    }

    async fn on_notification_opened_app(
        &self,
        tx: UnboundedSender<NotificationPayload>,
    ) -> Result<SubscriptionId, TransportError> {
        self.register(TransportOp::OnNotificationOpened, Listener::Opened(tx))
            .await
    }

    async fn on_token_refresh(
        &self,
        tx: UnboundedSender<String>,
    ) -> Result<SubscriptionId, TransportError> {
        self.register(TransportOp::OnTokenRefresh, Listener::TokenRefresh(tx))
            .await
    }

    async fn remove_listener(&self, id: SubscriptionId) {
        let mut s = self.state.lock().await;
        *s.calls.entry(TransportOp::RemoveListener).or_insert(0) += 1;
        s.listeners.remove(&id);
    }

    async fn get_initial_notification(
        &self,
    ) -> Result<Option<NotificationPayload>, TransportError> {
        let s = self.enter(TransportOp::InitialNotification).await?;
        Ok(s.initial.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn token_is_stable_until_deleted() {
        let t = LoopbackTransport::new();
        let a = t.get_token().await.unwrap();
        let b = t.get_token().await.unwrap();
        assert_eq!(a, b);
        t.delete_token().await.unwrap();
        assert!(t.current_token().await.is_none());
        let c = t.get_token().await.unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn events_reach_matching_listeners_only() {
        let t = LoopbackTransport::new();
        let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();
        let (tap_tx, mut tap_rx) = mpsc::unbounded_channel();
        t.on_message(msg_tx).await.unwrap();
        let tap_id = t.on_notification_opened_app(tap_tx).await.unwrap();

        assert_eq!(t.push_foreground(NotificationPayload::default()).await, 1);
        let got = msg_rx.recv().await.unwrap();
        assert!(got.message_id.is_some());
        assert!(tap_rx.try_recv().is_err());

        t.remove_listener(tap_id).await;
        assert_eq!(t.tap(NotificationPayload::default()).await, 0);
        assert_eq!(t.active_listeners().await, 1);
    }

    #[tokio::test]
    async fn injected_failure_counts_the_call() {
        let t = LoopbackTransport::new();
        t.fail(TransportOp::GetToken).await;
        assert!(t.get_token().await.is_err());
        assert_eq!(t.calls(TransportOp::GetToken).await, 1);
        t.heal(TransportOp::GetToken).await;
        assert!(t.get_token().await.is_ok());
    }

    #[tokio::test]
    async fn topics_track_remote_membership() {
        let t = LoopbackTransport::new();
        t.subscribe_to_topic("news_updates").await.unwrap();
        assert!(t.is_subscribed("news_updates").await);
        t.unsubscribe_from_topic("news_updates").await.unwrap();
        assert!(!t.is_subscribed("news_updates").await);
    }
}
