//! Scripted collaborators shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::consent::{ConsentError, GrantResult, PlatformConsent};
use crate::router::{Prompt, PromptChoice, PromptPresenter};
use crate::sink::{SinkError, TokenRegistration, TokenSink};

pub struct ScriptedConsent {
    result: Mutex<Result<GrantResult, ConsentError>>,
    calls: AtomicUsize,
}

impl ScriptedConsent {
    pub fn new(result: Result<GrantResult, ConsentError>) -> Self {
        Self {
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, result: Result<GrantResult, ConsentError>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformConsent for ScriptedConsent {
    async fn request_notifications(&self) -> Result<GrantResult, ConsentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().unwrap().clone()
    }
}

pub struct ScriptedPresenter {
    choice: PromptChoice,
    shown: Mutex<Vec<Prompt>>,
}

impl ScriptedPresenter {
    pub fn new(choice: PromptChoice) -> Self {
        Self {
            choice,
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<Prompt> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromptPresenter for ScriptedPresenter {
    async fn present(&self, prompt: Prompt) -> PromptChoice {
        self.shown.lock().unwrap().push(prompt);
        self.choice
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    received: Mutex<Vec<TokenRegistration>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<TokenRegistration> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenSink for RecordingSink {
    async fn register(&self, registration: &TokenRegistration) -> Result<(), SinkError> {
        self.received.lock().unwrap().push(registration.clone());
        if self.fail {
            return Err(SinkError::Rejected(500));
        }
        Ok(())
    }
}

/// Shows prompts but never answers them.
#[derive(Default)]
pub struct SilentPresenter {
    shown: AtomicUsize,
}

impl SilentPresenter {
    pub fn shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PromptPresenter for SilentPresenter {
    async fn present(&self, _prompt: Prompt) -> PromptChoice {
        self.shown.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<PromptChoice>().await
    }
}
