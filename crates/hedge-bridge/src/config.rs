//! Configuration for the bridge.
//!
//! Loaded from a TOML file, then overridden by environment variables and
//! CLI flags, then validated. Every field has a default matching the
//! deployed topology: the bridge binds localhost:5000 and the upstream
//! addon listens on localhost:8081.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// Top-level bridge configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Local address the HTTP listener binds.
    pub bind_addr: SocketAddr,

    /// Logging level: trace, debug, info, warn, error.
    pub log_level: String,

    /// Trade queue capacity.
    pub queue_capacity: usize,

    /// Upstream peer endpoints and egress policy.
    pub upstream: UpstreamConfig,
}

/// Upstream ("addon") peer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream addon.
    pub base_url: String,

    /// Path receiving forwarded closure notifications.
    pub notify_path: String,

    /// Path probed by the reconnect coordinator.
    pub ping_path: String,

    /// Attempts for a closure forward before giving up.
    pub forward_attempts: u32,

    /// Timeout for the liveness probe, in seconds.
    pub ping_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".parse().expect("valid default bind addr"),
            log_level: "info".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            notify_path: "/notify_hedge_closed".to_string(),
            ping_path: "/ping_msm".to_string(),
            forward_attempts: 3,
            ping_timeout_secs: 5,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Apply `BRIDGE_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("BRIDGE_BIND_ADDR") {
            self.bind_addr = addr
                .parse()
                .with_context(|| format!("invalid BRIDGE_BIND_ADDR '{}'", addr))?;
        }
        if let Ok(url) = std::env::var("BRIDGE_UPSTREAM_URL") {
            self.upstream.base_url = url;
        }
        if let Ok(level) = std::env::var("BRIDGE_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Apply CLI overrides; they win over both file and environment.
    pub fn apply_cli_overrides(
        &mut self,
        bind_addr: Option<SocketAddr>,
        upstream_url: Option<String>,
        log_level: Option<String>,
    ) {
        if let Some(addr) = bind_addr {
            self.bind_addr = addr;
        }
        if let Some(url) = upstream_url {
            self.upstream.base_url = url;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
    }

    /// Check the merged configuration before startup.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }
        if self.upstream.forward_attempts == 0 {
            bail!("upstream.forward_attempts must be at least 1");
        }
        if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            bail!(
                "upstream.base_url must be an http(s) URL, got '{}'",
                self.upstream.base_url
            );
        }
        if !self.upstream.notify_path.starts_with('/') || !self.upstream.ping_path.starts_with('/') {
            bail!("upstream paths must start with '/'");
        }
        Ok(())
    }
}
