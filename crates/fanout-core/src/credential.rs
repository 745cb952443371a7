//! Shared login credential, acquired at most once per invocation

use std::sync::Arc;

use fanout_exec::Secret;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Errors while obtaining the shared credential
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The source produced an empty value
    #[error("password is required")]
    Empty,

    /// The source could not produce a value (no TTY, unset variable, ...)
    #[error("password unavailable: {0}")]
    Unavailable(String),

    /// An earlier acquisition in this invocation already failed
    #[error("password was requested earlier in this run and not captured")]
    NotCaptured,
}

/// Where the credential comes from
///
/// `acquire` may block (interactive prompt); callers run it off the async
/// worker threads.
pub trait CredentialSource: Send + Sync {
    /// Produce the secret, showing `prompt` if the source is interactive
    ///
    /// # Errors
    /// Returns `CredentialError::Unavailable` if no value can be read.
    fn acquire(&self, prompt: &str) -> Result<Secret, CredentialError>;
}

/// Reads the password from the controlling terminal without echo
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptSource;

impl CredentialSource for PromptSource {
    fn acquire(&self, prompt: &str) -> Result<Secret, CredentialError> {
        rpassword::prompt_password(prompt)
            .map(Secret::new)
            .map_err(|e| CredentialError::Unavailable(e.to_string()))
    }
}

/// Reads the password from an environment variable
#[derive(Debug, Clone)]
pub struct EnvSource {
    var: String,
}

impl EnvSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvSource {
    fn acquire(&self, _prompt: &str) -> Result<Secret, CredentialError> {
        std::env::var(&self.var)
            .map(Secret::new)
            .map_err(|e| CredentialError::Unavailable(format!("{}: {e}", self.var)))
    }
}

/// Fixed secret, for callers that already hold one
#[derive(Debug, Clone)]
pub struct StaticSource(Secret);

impl StaticSource {
    pub fn new(secret: Secret) -> Self {
        Self(secret)
    }
}

impl CredentialSource for StaticSource {
    fn acquire(&self, _prompt: &str) -> Result<Secret, CredentialError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct CacheState {
    secret: Option<Secret>,
    requested: bool,
}

/// Process-wide credential cache shared by every session of one run
///
/// The first `ensure` call asks the source; concurrent callers wait on the
/// lock and then reuse the stored value. After a failed acquisition the
/// source is never asked again.
pub struct CredentialCache {
    source: Arc<dyn CredentialSource>,
    prompt: String,
    state: Mutex<CacheState>,
}

impl CredentialCache {
    /// Cache for `username`, filled from `source` on first use
    pub fn new(source: Arc<dyn CredentialSource>, username: &str) -> Self {
        Self {
            source,
            prompt: format!("Password for {username}: "),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Return the cached secret, acquiring it first if needed
    ///
    /// # Errors
    /// Returns `CredentialError::Empty` for an empty value, the source's error
    /// on the first failure, and `CredentialError::NotCaptured` on any later
    /// call once acquisition has failed.
    pub async fn ensure(&self) -> Result<Secret, CredentialError> {
        let mut state = self.state.lock().await;

        if let Some(secret) = &state.secret {
            return Ok(secret.clone());
        }
        if state.requested {
            return Err(CredentialError::NotCaptured);
        }
        state.requested = true;

        let source = Arc::clone(&self.source);
        let prompt = self.prompt.clone();
        let secret = tokio::task::spawn_blocking(move || source.acquire(&prompt))
            .await
            .map_err(|e| CredentialError::Unavailable(e.to_string()))?
            .inspect_err(|e| warn!(error = %e, "failed to acquire password"))?;

        if secret.is_empty() {
            warn!("empty password supplied");
            return Err(CredentialError::Empty);
        }

        debug!("password acquired and cached");
        state.secret = Some(secret.clone());
        Ok(secret)
    }
}
