//! # Handshake Session
//!
//! Every operation that needs ciphertext re-establishes its own session with
//! the co-processor. Sessions are never shared across operations.

use crate::coprocessor::{Coprocessor, CoprocessorError};
use crate::utils::constants::{COPROCESSOR_HANDSHAKE_ATTEMPTS, COPROCESSOR_RETRY_DELAY};
use std::time::Duration;

/// Fixed-delay retry budget for the co-processor handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: COPROCESSOR_HANDSHAKE_ATTEMPTS,
            delay: COPROCESSOR_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

/// Readiness of the co-processor for the current operation.
#[derive(Debug, Clone)]
pub struct CoprocessorSession {
    pub ready: bool,
    pub attempts_used: u32,
    pub last_error: Option<CoprocessorError>,
}

impl CoprocessorSession {
    /// For operations that cannot proceed without ciphertext.
    pub fn require(&self) -> Result<(), CoprocessorError> {
        if self.ready {
            return Ok(());
        }
        Err(match &self.last_error {
            Some(CoprocessorError::Unavailable(msg)) => CoprocessorError::Unavailable(msg.clone()),
            Some(other) => CoprocessorError::Unavailable(other.to_string()),
            None => CoprocessorError::Unavailable("handshake not attempted".to_string()),
        })
    }
}

/// Runs `initialize()` until it succeeds or the policy's attempts run out.
///
/// `on_retry` receives a human-readable notice before each wait so callers
/// can surface it in their transcript.
pub async fn ensure_ready<F>(
    coprocessor: &dyn Coprocessor,
    policy: RetryPolicy,
    mut on_retry: F,
) -> CoprocessorSession
where
    F: FnMut(String),
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match coprocessor.initialize().await {
            Ok(()) => {
                return CoprocessorSession {
                    ready: true,
                    attempts_used: attempt,
                    last_error: None,
                };
            }
            Err(e) => {
                let left = attempts - attempt;
                if left > 0 {
                    let notice = format!(
                        "Co-processor connection failed, retrying... ({} attempts left)",
                        left
                    );
                    log::warn!("{} [{}]", notice, e);
                    on_retry(notice);
                    tokio::time::sleep(policy.delay).await;
                } else {
                    log::error!(
                        "Co-processor handshake failed after {} attempts: {}",
                        attempts,
                        e
                    );
                }
                last_error = Some(e);
            }
        }
    }

    CoprocessorSession {
        ready: false,
        attempts_used: attempts,
        last_error,
    }
}
