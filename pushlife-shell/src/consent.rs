//! Consent prompt with a configured answer; a desktop host has no runtime prompt.

use async_trait::async_trait;
use pushlife_core::consent::ConsentError;
use pushlife_core::{GrantResult, PlatformConsent};

pub struct StaticConsent(pub GrantResult);

#[async_trait]
impl PlatformConsent for StaticConsent {
    async fn request_notifications(&self) -> Result<GrantResult, ConsentError> {
        log::debug!("simulated consent prompt answered {:?}", self.0);
        Ok(self.0)
    }
}
