//! Lifecycle orchestrator: runs permission -> token -> listeners -> cold-start
//! in order and exposes one state+action surface to the display shell.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::Config;
use crate::consent::{ConsentGranted, ConsentState, PermissionGate, Platform, PlatformConsent};
use crate::listeners::{ListenerError, ListenerRegistry, ListenerStreams, TeardownHandle};
use crate::payload::{MessagingToken, NotificationPayload};
use crate::router::{
    DeliveryContext, NotificationRouter, PromptPresenter, RouteIntent, RouteOutcome,
};
use crate::sink::{TokenRegistration, TokenSink};
use crate::token::TokenManager;
use crate::topic;
use crate::transport::MessagingTransport;

/// Initialization phase. PermissionDenied, TokenUnavailable and
/// ListenersFailed end the sequence for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Idle,
    PermissionPending,
    PermissionDenied,
    TokenPending,
    TokenUnavailable,
    ListenersActive,
    ListenersFailed,
    ColdStartChecked,
    Ready,
}

impl LifecyclePhase {
    pub fn is_ready(self) -> bool {
        self == LifecyclePhase::Ready
    }
}

/// Snapshot of everything the shell renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellState {
    pub permission_granted: bool,
    pub token: Option<MessagingToken>,
    pub initial_notification: Option<NotificationPayload>,
    pub phase: LifecyclePhase,
}

impl ShellState {
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn ready(&self) -> bool {
        self.phase.is_ready()
    }
}

pub struct LifecycleOrchestrator {
    config: Config,
    transport: Arc<dyn MessagingTransport>,
    gate: PermissionGate,
    tokens: TokenManager,
    registry: ListenerRegistry,
    router: NotificationRouter,
    sink: Option<Arc<dyn TokenSink>>,
    phase: watch::Sender<LifecyclePhase>,
    initial: watch::Sender<Option<NotificationPayload>>,
    cold_start_checked: AtomicBool,
}

impl LifecycleOrchestrator {
    /// Build the orchestrator. The returned receiver carries route intents
    /// for the shell to fulfil.
    pub fn new(
        config: Config,
        platform: Platform,
        transport: Arc<dyn MessagingTransport>,
        consent: Arc<dyn PlatformConsent>,
        presenter: Arc<dyn PromptPresenter>,
    ) -> (Self, UnboundedReceiver<RouteIntent>) {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let router = NotificationRouter::new(
            presenter,
            intent_tx,
            config.fallback_title.clone(),
            config.fallback_body.clone(),
        );
        let (phase, _) = watch::channel(LifecyclePhase::Idle);
        let (initial, _) = watch::channel(None);
        let orchestrator = Self {
            gate: PermissionGate::new(platform, consent, transport.clone()),
            tokens: TokenManager::new(transport.clone()),
            registry: ListenerRegistry::new(transport.clone()),
            transport,
            router,
            sink: None,
            config,
            phase,
            initial,
            cold_start_checked: AtomicBool::new(false),
        };
        (orchestrator, intent_rx)
    }

    pub fn with_sink(mut self, sink: Arc<dyn TokenSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    pub fn watch_token(&self) -> watch::Receiver<Option<MessagingToken>> {
        self.tokens.watch()
    }

    pub fn state(&self) -> ShellState {
        ShellState {
            permission_granted: self.gate.state().is_granted(),
            token: self.tokens.current(),
            initial_notification: self.initial.borrow().clone(),
            phase: self.phase(),
        }
    }

    fn enter(&self, phase: LifecyclePhase) {
        let prev = self.phase.send_replace(phase);
        log::debug!("lifecycle {:?} -> {:?}", prev, phase);
    }

    /// Start initialization on a task. Mount once per process; a second
    /// mount without shutting the first session down registers duplicates.
    pub fn mount(self: &Arc<Self>) -> Session {
        let this = self.clone();
        Session {
            init: Some(tokio::spawn(async move { this.initialize().await })),
        }
    }

    /// Run the init sequence. Returns the listener handle when listeners
    /// were registered, whether or not the later steps complete.
    pub async fn initialize(self: &Arc<Self>) -> Option<TeardownHandle> {
        let granted = self.stage_permission().await?;
        let token = self.stage_token(granted).await?;
        let listeners = match self.stage_listeners(&token).await {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("notification init stopped: {}", e);
                self.enter(LifecyclePhase::ListenersFailed);
                return None;
            }
        };
        self.stage_cold_start(&listeners).await;
        self.enter(LifecyclePhase::Ready);
        log::info!("notification lifecycle ready");
        Some(listeners)
    }

    async fn stage_permission(&self) -> Option<ConsentGranted> {
        self.enter(LifecyclePhase::PermissionPending);
        let granted = self.gate.request_permission().await.granted();
        if granted.is_none() {
            self.enter(LifecyclePhase::PermissionDenied);
        }
        granted
    }

    async fn stage_token(&self, _granted: ConsentGranted) -> Option<MessagingToken> {
        self.enter(LifecyclePhase::TokenPending);
        let token = self.tokens.acquire_token().await;
        if token.is_none() {
            self.enter(LifecyclePhase::TokenUnavailable);
        }
        token
    }

    async fn stage_listeners(
        self: &Arc<Self>,
        token: &MessagingToken,
    ) -> Result<TeardownHandle, ListenerError> {
        log::debug!("registering listeners for {}", token.redacted());
        let (mut handle, streams) = self.registry.start().await?;
        handle.attach_pump(tokio::spawn(pump(self.clone(), streams)));
        self.enter(LifecyclePhase::ListenersActive);
        Ok(handle)
    }

    /// Ask the transport once per process for the launching notification.
    async fn stage_cold_start(&self, _listeners: &TeardownHandle) {
        if self.cold_start_checked.swap(true, Ordering::SeqCst) {
            log::debug!("cold-start notification already checked");
        } else {
            match self.transport.get_initial_notification().await {
                Ok(Some(payload)) => {
                    log::info!("app opened from quit state by notification");
                    self.initial.send_replace(Some(payload.clone()));
                    self.router
                        .route(&payload, DeliveryContext::ColdStartTap)
                        .await;
                }
                Ok(None) => {}
                Err(e) => log::warn!("initial notification query failed: {}", e),
            }
        }
        self.enter(LifecyclePhase::ColdStartChecked);
    }

    async fn on_token_refresh(&self, raw: String) {
        self.tokens.apply_refresh(raw);
        if self.config.sync_on_refresh {
            self.send_token_to_server().await;
        }
    }

    /// Re-ask for consent. Never retried automatically.
    pub async fn request_permission(&self) -> ConsentState {
        self.gate.request_permission().await
    }

    pub async fn get_token(&self) -> Option<MessagingToken> {
        self.tokens.acquire_token().await
    }

    pub async fn delete_token(&self) -> bool {
        self.tokens.delete_token().await
    }

    pub async fn subscribe_to_topic(&self, name: &str) -> bool {
        topic::subscribe(self.transport.as_ref(), name).await
    }

    pub async fn unsubscribe_from_topic(&self, name: &str) -> bool {
        topic::unsubscribe(self.transport.as_ref(), name).await
    }

    /// Push the current token to the sink. Failures are logged only.
    pub async fn send_token_to_server(&self) -> bool {
        let Some(sink) = &self.sink else {
            log::debug!("no token sink configured");
            return false;
        };
        let Some(token) = self.tokens.current() else {
            log::debug!("no token to send to server");
            return false;
        };
        let registration = TokenRegistration {
            token: token.as_str().to_string(),
            platform: self.gate.platform().name().to_string(),
            user_id: self.config.user_id.clone(),
        };
        match sink.register(&registration).await {
            Ok(()) => {
                log::info!("token sent to server: {}", token.redacted());
                true
            }
            Err(e) => {
                log::warn!("error sending token to server: {}", e);
                false
            }
        }
    }

    /// Route a payload outside the listener flow (hosts replaying a payload).
    pub async fn route(
        &self,
        payload: &NotificationPayload,
        context: DeliveryContext,
    ) -> RouteOutcome {
        self.router.route(payload, context).await
    }
}

/// Dispatch listener events until the streams close or the pump is aborted.
/// Foreground prompts run on their own tasks so taps and token refreshes keep
/// flowing while a prompt waits for the user; aborting the pump drops them.
async fn pump(orchestrator: Arc<LifecycleOrchestrator>, mut streams: ListenerStreams) {
    let mut prompts = JoinSet::new();
    loop {
        tokio::select! {
            Some(payload) = streams.messages.recv() => {
                let orchestrator = orchestrator.clone();
                prompts.spawn(async move {
                    orchestrator
                        .router
                        .route(&payload, DeliveryContext::Foreground)
                        .await;
                });
            }
            Some(payload) = streams.taps.recv() => {
                log::info!("app opened from background by notification");
                orchestrator.router.route(&payload, DeliveryContext::BackgroundTap).await;
            }
            Some(raw) = streams.token_refreshes.recv() => {
                orchestrator.on_token_refresh(raw).await;
            }
            Some(done) = prompts.join_next(), if !prompts.is_empty() => {
                if let Err(e) = done {
                    log::warn!("foreground prompt task failed: {}", e);
                }
            }
            else => break,
        }
    }
    log::debug!("listener streams closed");
}

/// A mounted lifecycle. Shutting down waits for in-flight initialization
/// so a listener set produced late is still torn down. Dropping the session
/// does the same on a background task.
#[must_use = "dropping a session tears its listeners down"]
pub struct Session {
    init: Option<JoinHandle<Option<TeardownHandle>>>,
}

impl Session {
    pub fn is_settled(&self) -> bool {
        self.init.as_ref().map_or(true, |init| init.is_finished())
    }

    pub async fn shutdown(mut self) {
        if let Some(init) = self.init.take() {
            settle(init).await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(init) = self.init.take() else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(settle(init));
            }
            Err(_) => init.abort(),
        }
    }
}

async fn settle(init: JoinHandle<Option<TeardownHandle>>) {
    match init.await {
        Ok(Some(handle)) => handle.teardown().await,
        Ok(None) => log::debug!("no listeners to tear down"),
        Err(e) => log::warn!("notification init task failed: {}", e),
    }
}
