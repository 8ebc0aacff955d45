//! Configuration file management for planforge.
//!
//! Provides an optional TOML config file at `~/.config/planforge/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use planforge_core::config::{AuditConfig, Backoff, GenerationConfig, RetryPolicy, ServiceConfig};

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

/// On-disk config. Every section and key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub generation: GenerationSection,
    pub audit: AuditSection,
    pub retry: RetrySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// 0 disables the deadline.
    pub request_deadline_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
    pub pass_threshold: Option<u8>,
    pub fallback_score: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub delay_ms: Option<u64>,
    /// "fixed" or "exponential".
    pub backoff: Option<String>,
    pub jitter: Option<bool>,
    pub retry_client_errors: Option<bool>,
}

/// Written by `planforge init`. Everything is commented out so the file
/// documents the defaults without pinning them.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# planforge configuration.
# Resolution order: CLI flag > environment variable > this file > default.

[server]
# bind = "0.0.0.0"
# port = 5000
# request_deadline_secs = 300   # 0 disables the deadline

[generation]
# base_url = "https://generativelanguage.googleapis.com/v1beta"   # env: PLANFORGE_GENERATION_URL
# model = "gemini-2.5-flash"                                     # env: PLANFORGE_GENERATION_MODEL
# api_key = "..."                                                # env: GEMINI_API_KEY
# timeout_secs = 60

[audit]
# base_url = "https://api.groq.com/openai/v1"   # env: PLANFORGE_AUDIT_URL
# model = "llama-3.3-70b-versatile"             # env: PLANFORGE_AUDIT_MODEL
# api_key = "..."                               # env: AUDIT_API_KEY
# timeout_secs = 60
# temperature = 0.1
# pass_threshold = 80
# fallback_score = 80

[retry]
# max_attempts = 3
# delay_ms = 1000
# backoff = "fixed"            # or "exponential"
# jitter = false
# retry_client_errors = true   # false stops retrying 4xx (except 408/429)
"#;

// -----------------------------------------------------------------------
// Environment variable names
// -----------------------------------------------------------------------

pub const ENV_GENERATION_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_AUDIT_API_KEY: &str = "AUDIT_API_KEY";
pub const ENV_GENERATION_URL: &str = "PLANFORGE_GENERATION_URL";
pub const ENV_GENERATION_MODEL: &str = "PLANFORGE_GENERATION_MODEL";
pub const ENV_AUDIT_URL: &str = "PLANFORGE_AUDIT_URL";
pub const ENV_AUDIT_MODEL: &str = "PLANFORGE_AUDIT_MODEL";

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the planforge config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/planforge` or
/// `~/.config/planforge`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("planforge");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("planforge")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Parse a config file.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Write the commented template, creating parent dirs as needed.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The file may end up holding API keys.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct PlanforgeConfig {
    pub bind: String,
    pub port: u16,
    pub service: ServiceConfig,
}

impl PlanforgeConfig {
    pub const DEFAULT_BIND: &str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 5000;
    pub const DEFAULT_REQUEST_DEADLINE_SECS: u64 = 300;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Resolve from the real environment and config file.
    ///
    /// An explicit `config_path` must exist. The default path is optional.
    pub fn resolve(config_path_override: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        let file = match config_path_override {
            Some(path) => Some(load_config(path)?),
            None => {
                let path = config_path();
                if path.exists() {
                    Some(load_config(&path)?)
                } else {
                    None
                }
            }
        };
        Self::resolve_with(file.unwrap_or_default(), cli, |key| std::env::var(key).ok())
    }

    /// Resolution core, with the environment injected.
    pub fn resolve_with(
        file: ConfigFile,
        cli: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        let bind = cli
            .bind
            .clone()
            .or(file.server.bind)
            .unwrap_or_else(|| Self::DEFAULT_BIND.to_string());
        let port = cli.port.or(file.server.port).unwrap_or(Self::DEFAULT_PORT);
        let deadline_secs = file
            .server
            .request_deadline_secs
            .unwrap_or(Self::DEFAULT_REQUEST_DEADLINE_SECS);

        let generation = GenerationConfig {
            base_url: env(ENV_GENERATION_URL)
                .or(file.generation.base_url)
                .unwrap_or_else(|| GenerationConfig::DEFAULT_BASE_URL.to_string()),
            model: env(ENV_GENERATION_MODEL)
                .or(file.generation.model)
                .unwrap_or_else(|| GenerationConfig::DEFAULT_MODEL.to_string()),
            api_key: env(ENV_GENERATION_API_KEY).or(file.generation.api_key),
            timeout: Duration::from_secs(
                file.generation
                    .timeout_secs
                    .unwrap_or(Self::DEFAULT_TIMEOUT_SECS),
            ),
        };

        let audit_defaults = AuditConfig::default();
        let pass_threshold = file
            .audit
            .pass_threshold
            .unwrap_or(audit_defaults.pass_threshold);
        let fallback_score = file
            .audit
            .fallback_score
            .unwrap_or(audit_defaults.fallback_score);
        if pass_threshold > 100 {
            bail!("audit.pass_threshold must be between 0 and 100, got {pass_threshold}");
        }
        if fallback_score > 100 {
            bail!("audit.fallback_score must be between 0 and 100, got {fallback_score}");
        }
        if fallback_score < pass_threshold {
            tracing::warn!(
                fallback_score,
                pass_threshold,
                "audit fallback score is below the pass threshold; an auditor outage will trigger regeneration"
            );
        }

        let audit = AuditConfig {
            base_url: env(ENV_AUDIT_URL)
                .or(file.audit.base_url)
                .unwrap_or(audit_defaults.base_url),
            model: env(ENV_AUDIT_MODEL)
                .or(file.audit.model)
                .unwrap_or(audit_defaults.model),
            api_key: env(ENV_AUDIT_API_KEY).or(file.audit.api_key),
            timeout: Duration::from_secs(file.audit.timeout_secs.unwrap_or(Self::DEFAULT_TIMEOUT_SECS)),
            temperature: file.audit.temperature.unwrap_or(audit_defaults.temperature),
            pass_threshold,
            fallback_score,
        };

        let retry_defaults = RetryPolicy::default();
        let backoff = match file.retry.backoff {
            Some(s) => s
                .parse::<Backoff>()
                .map_err(anyhow::Error::msg)
                .context("invalid retry.backoff in config file")?,
            None => retry_defaults.backoff,
        };
        let retry = RetryPolicy {
            max_attempts: file.retry.max_attempts.unwrap_or(retry_defaults.max_attempts),
            delay: file
                .retry
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.delay),
            backoff,
            jitter: file.retry.jitter.unwrap_or(retry_defaults.jitter),
            retry_client_errors: file
                .retry
                .retry_client_errors
                .unwrap_or(retry_defaults.retry_client_errors),
        };

        Ok(Self {
            bind,
            port,
            service: ServiceConfig {
                generation,
                audit,
                retry,
                request_deadline: (deadline_secs > 0).then(|| Duration::from_secs(deadline_secs)),
            },
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
