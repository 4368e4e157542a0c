//! Load config from file and environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use pushlife_core::{GrantResult, Platform};

/// Shell configuration. File: ~/.config/pushlife/config.toml or /etc/pushlife/config.toml.
/// Env overrides: PUSHLIFE_SERVER_URL, PUSHLIFE_USER_ID, PUSHLIFE_PLATFORM,
/// PUSHLIFE_API_LEVEL. The log filter comes from RUST_LOG or PUSHLIFE_LOG.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Token registration endpoint. No sink when unset.
    #[serde(default)]
    pub server_url: Option<String>,
    /// Host platform for consent policy (default: android, API 33).
    #[serde(default = "default_platform")]
    pub platform: Platform,
    /// Answer of the simulated platform consent prompt (default granted).
    #[serde(default = "default_consent")]
    pub consent: GrantResult,
    /// Topics subscribed once the lifecycle is ready.
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub core: pushlife_core::Config,
}

fn default_platform() -> Platform {
    Platform::Android { api_level: 33 }
}
fn default_consent() -> GrantResult {
    GrantResult::Granted
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            platform: default_platform(),
            consent: default_consent(),
            topics: Vec::new(),
            core: pushlife_core::Config::default(),
        }
    }
}

/// Load config: merge default, then config file (explicit path or the first
/// present default path), then env vars.
pub fn load(explicit: Option<&Path>) -> Config {
    let mut c = match explicit {
        Some(p) => load_path(p),
        None => load_file(),
    }
    .unwrap_or_default();
    apply_env(&mut c, |k| std::env::var(k).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("PUSHLIFE_SERVER_URL") {
        c.server_url = Some(s).filter(|s| !s.is_empty());
    }
    if let Some(s) = var("PUSHLIFE_USER_ID") {
        c.core.user_id = s;
    }
    if let Some(s) = var("PUSHLIFE_PLATFORM") {
        match s.to_ascii_lowercase().as_str() {
            "android" => {
                if !matches!(c.platform, Platform::Android { .. }) {
                    c.platform = default_platform();
                }
            }
            "ios" => c.platform = Platform::Ios,
            "other" => c.platform = Platform::Other,
            other => log::warn!("ignoring unknown PUSHLIFE_PLATFORM {:?}", other),
        }
    }
    if let Some(s) = var("PUSHLIFE_API_LEVEL") {
        if let (Ok(level), Platform::Android { api_level }) = (s.parse::<u32>(), &mut c.platform) {
            *api_level = level;
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/pushlife/config.toml"));
    }
    out.push(PathBuf::from("/etc/pushlife/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    let p = config_paths().into_iter().find(|p| p.exists())?;
    load_path(&p)
}

fn load_path(p: &Path) -> Option<Config> {
    let s = match std::fs::read_to_string(p) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("cannot read config {}: {}", p.display(), e);
            return None;
        }
    };
    match toml::from_str::<Config>(&s) {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!("invalid config {}: {}", p.display(), e);
            None
        }
    }
}
