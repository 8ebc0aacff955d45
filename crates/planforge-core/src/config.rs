//! Process-wide configuration for the plan pipeline.
//!
//! Everything here is fixed at startup and handed to component constructors
//! by reference. Components never read the environment themselves, so tests
//! can point them at substitute endpoints.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Primary (generation) model endpoint settings.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// API root, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub base_url: String,
    /// Model name inserted into `models/{model}:generateContent`.
    pub model: String,
    /// Sent as the `key` query parameter. `None` means calls will be rejected
    /// upstream; the service still starts.
    pub api_key: Option<String>,
    /// Per-call transport timeout.
    pub timeout: Duration,
}

impl GenerationConfig {
    pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
    pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

    /// Build a config with defaults for everything except the endpoint.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            model: Self::DEFAULT_MODEL.to_owned(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Secondary (audit) model endpoint settings and scoring policy.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    /// Bearer token.
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Sampling temperature requested from the auditor. Kept low so scores
    /// are close to deterministic.
    pub temperature: f32,
    /// Minimum score accepted without regeneration.
    pub pass_threshold: u8,
    /// Score reported when the auditor cannot be reached or understood.
    /// Sits at or above `pass_threshold` by default so an outage never blocks
    /// delivery.
    pub fallback_score: u8,
}

impl AuditConfig {
    pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
    pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
    pub const DEFAULT_PASS_THRESHOLD: u8 = 80;
    pub const DEFAULT_FALLBACK_SCORE: u8 = 80;

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            model: Self::DEFAULT_MODEL.to_owned(),
            api_key: None,
            timeout: Duration::from_secs(60),
            temperature: 0.1,
            pass_threshold: Self::DEFAULT_PASS_THRESHOLD,
            fallback_score: Self::DEFAULT_FALLBACK_SCORE,
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// How the delay between generation attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles after each failed attempt.
    Exponential,
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("fixed"),
            Self::Exponential => f.write_str("exponential"),
        }
    }
}

impl FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            other => Err(format!(
                "invalid backoff {other:?} (expected fixed or exponential)"
            )),
        }
    }
}

/// Retry behaviour of the generation client.
///
/// The default reproduces the long-standing behaviour: three attempts, one
/// second apart, every failure retried alike. Exponential backoff, jitter and
/// skipping client errors are opt-in.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub delay: Duration,
    pub backoff: Backoff,
    /// Add up to 50% random extra delay to each wait.
    pub jitter: bool,
    /// Retry 4xx responses (other than 408 and 429) like any other failure.
    pub retry_client_errors: bool,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor)
            }
        };
        if self.jitter {
            use rand::Rng;
            let extra = rand::rng().random_range(0.0..=0.5);
            base + base.mul_f64(extra)
        } else {
            base
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            delay: Self::DEFAULT_DELAY,
            backoff: Backoff::Fixed,
            jitter: false,
            retry_client_errors: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Fully resolved service configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub generation: GenerationConfig,
    pub audit: AuditConfig,
    pub retry: RetryPolicy,
    /// Upper bound on one whole generate/audit cycle. `None` disables it.
    pub request_deadline: Option<Duration>,
}

impl ServiceConfig {
    /// Names of the API keys that are not configured.
    pub fn missing_api_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.generation.api_key.as_deref().is_none_or(str::is_empty) {
            missing.push("generation");
        }
        if self.audit.api_key.as_deref().is_none_or(str::is_empty) {
            missing.push("audit");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_policy_is_fixed_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 3);
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(1));
        assert!(policy.retry_client_errors);
    }

    #[test]
    fn exponential_backoff_doubles() {
        let policy = RetryPolicy {
            backoff: Backoff::Exponential,
            delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn jitter_stays_within_half_again() {
        let policy = RetryPolicy {
            jitter: true,
            delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let d = policy.delay_after(1);
            assert!(d >= Duration::from_millis(100), "{d:?}");
            assert!(d <= Duration::from_millis(150), "{d:?}");
        }
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.attempts(), 1);
    }

    #[test]
    fn backoff_parses() {
        assert_eq!("fixed".parse::<Backoff>().unwrap(), Backoff::Fixed);
        assert_eq!(
            "exponential".parse::<Backoff>().unwrap(),
            Backoff::Exponential
        );
        assert!("linear".parse::<Backoff>().is_err());
        assert_eq!(Backoff::Exponential.to_string(), "exponential");
    }

    #[test]
    fn missing_api_keys_reports_both() {
        let mut cfg = ServiceConfig::default();
        assert_eq!(cfg.missing_api_keys(), vec!["generation", "audit"]);

        cfg.generation.api_key = Some("g".into());
        cfg.audit.api_key = Some(String::new());
        assert_eq!(cfg.missing_api_keys(), vec!["audit"]);
    }

    #[test]
    fn fallback_score_passes_default_threshold() {
        let cfg = AuditConfig::default();
        assert!(cfg.fallback_score >= cfg.pass_threshold);
    }
}
