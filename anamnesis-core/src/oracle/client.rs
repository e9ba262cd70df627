//! Timeout-bounded Oracle access with typed results.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::parse::{FallbackReason, Parsed, clean_response};
use super::{Oracle, OracleError, OracleRequest};

/// Per-call timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Wraps an [`Oracle`] with a per-call timeout and response cleaning.
#[derive(Clone)]
pub struct OracleClient {
    oracle: Arc<dyn Oracle>,
    timeout: Duration,
}

impl std::fmt::Debug for OracleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleClient")
            .field("oracle", &self.oracle.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OracleClient {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request and return the cleaned reply.
    ///
    /// An empty reply after cleaning counts as a failure.
    pub async fn ask(&self, request: &OracleRequest) -> Result<String, OracleError> {
        debug!(role = %request.role, oracle = self.oracle.name(), "oracle request");
        let raw = tokio::time::timeout(self.timeout, self.oracle.ask(request))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))??;
        let cleaned = clean_response(&raw);
        if cleaned.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(cleaned)
    }

    /// Ask for free text, substituting `default` if the call fails.
    pub async fn ask_text(&self, request: &OracleRequest, default: &str) -> Parsed<String> {
        match self.ask(request).await {
            Ok(text) => Parsed::Value(text),
            Err(err) => {
                warn!(role = %request.role, error = %err, "oracle call failed, using default");
                Parsed::Fallback {
                    value: default.to_string(),
                    reason: FallbackReason::Unavailable(err.to_string()),
                }
            }
        }
    }

    /// Ask and parse the reply with `parse`, substituting `default` if the
    /// call fails or the reply does not parse. Unparsable replies are logged
    /// verbatim.
    pub async fn ask_parsed<T>(
        &self,
        request: &OracleRequest,
        default: T,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> Parsed<T> {
        let text = match self.ask(request).await {
            Ok(text) => text,
            Err(err) => {
                warn!(role = %request.role, error = %err, "oracle call failed, using default");
                return Parsed::Fallback {
                    value: default,
                    reason: FallbackReason::Unavailable(err.to_string()),
                };
            }
        };
        match parse(&text) {
            Ok(value) => Parsed::Value(value),
            Err(detail) => {
                warn!(role = %request.role, %detail, raw = %text, "unparsable oracle reply, using default");
                Parsed::unparsable(default, &text, detail)
            }
        }
    }
}
