//! Push-notification lifecycle core.
//! Transport, consent prompt, prompt UI and token sink are traits the host implements.

pub mod config;
pub mod consent;
pub mod lifecycle;
pub mod listeners;
pub mod loopback;
pub mod payload;
pub mod router;
pub mod sink;
pub mod token;
pub mod topic;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use consent::{ConsentState, GrantResult, PermissionGate, Platform, PlatformConsent};
pub use lifecycle::{LifecycleOrchestrator, LifecyclePhase, Session, ShellState};
pub use listeners::{ListenerError, ListenerRegistry, TeardownHandle};
pub use loopback::LoopbackTransport;
pub use payload::{MessagingToken, NotificationPayload};
pub use router::{
    DeliveryContext, NotificationKind, NotificationRouter, Prompt, PromptChoice, PromptPresenter,
    RouteIntent,
};
pub use sink::{SinkError, TokenRegistration, TokenSink};
pub use token::TokenManager;
pub use transport::{MessagingTransport, TransportError};
