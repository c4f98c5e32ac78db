//! Bounded retry around model calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::{LanguageModel, LlmError};
use crate::config::{parse_var, ConfigError, EnvLookup};

/// Upper bound on any single wait, including server-provided `Retry-After` values.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// How many times to try a model call and how long to wait between tries.
///
/// Waits are fixed (no jitter, no growth): `delay` after ordinary transient
/// failures, `rate_limit_delay` after rate-limit or quota errors unless the server
/// asked for a specific wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            rate_limit_delay: Duration::from_secs(5),
        }
    }
}

/// Why a model call ultimately failed.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: LlmError },

    /// The model refused the request in a way retrying can't fix.
    #[error("{0}")]
    Rejected(LlmError),
}

impl RetryPolicy {
    /// A policy that never waits, for callers that schedule their own retries.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
            rate_limit_delay: Duration::ZERO,
        }
    }

    /// Apply `LLM_MAX_RETRIES`, `LLM_RETRY_DELAY_MS` and `LLM_RATE_LIMIT_DELAY_MS`.
    pub fn with_overrides(mut self, lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        if let Some(n) = parse_var(lookup, "LLM_MAX_RETRIES")? {
            self.max_attempts = n;
        }
        if let Some(ms) = parse_var(lookup, "LLM_RETRY_DELAY_MS")? {
            self.delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(lookup, "LLM_RATE_LIMIT_DELAY_MS")? {
            self.rate_limit_delay = Duration::from_millis(ms);
        }
        Ok(self)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait before the next attempt after `error`.
    pub fn delay_for(&self, error: &LlmError) -> Duration {
        let wait = match error {
            LlmError::RateLimited {
                retry_after: Some(after),
                ..
            } => *after,
            e if e.is_rate_limit() => self.rate_limit_delay,
            _ => self.delay,
        };
        wait.min(MAX_DELAY)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, InvokeError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max = self.attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => {
                    debug!("Attempt {} failed permanently: {}", attempt, e);
                    return Err(InvokeError::Rejected(e));
                }
                Err(e) if attempt >= max => {
                    warn!("Attempt {}/{} failed, giving up: {}", attempt, max, e);
                    return Err(InvokeError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let wait = self.delay_for(&e);
                    warn!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, max, e, wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Sends prompts to a model under a retry policy.
#[derive(Clone)]
pub struct LlmInvoker {
    model: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
}

impl LlmInvoker {
    pub fn new(model: Arc<dyn LanguageModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    pub fn model_name(&self) -> String {
        self.model.model_name()
    }

    /// Send `prompt` and return the raw reply text.
    pub async fn invoke(&self, prompt: &str) -> Result<String, InvokeError> {
        let model = &self.model;
        self.policy
            .run(|attempt| async move {
                debug!("Model call attempt {} ({})", attempt, model.model_name());
                model.generate(prompt).await
            })
            .await
    }
}
