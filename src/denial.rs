//! Denial handling: full logout and the insufficient-factors error.
//!
//! When a caller decides a user must not proceed (login-flow timeout,
//! too many neutral rounds), the denial handler runs the host's complete
//! logout sequence across every registered authentication backend,
//! destroys the session, and hands back the user-facing error to
//! surface. The sequence is unconditional: one misbehaving backend never
//! leaves a partially logged-out session behind.
//!
//! # Tracing Events
//!
//! - `mfa.denial.denied` - A session was denied for insufficient factors
//! - `mfa.denial.hook_failed` - A logout hook errored (sequence continues)
//! - `mfa.denial.destroy_failed` - The session could not be destroyed

use crate::error::{FactorGateError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Per-backend logout hook.
///
/// Implement one per enabled authentication backend; the denial handler
/// invokes all of them, in registration order.
#[async_trait]
pub trait LogoutHook: Send + Sync {
    /// Backend name, used in logs.
    fn name(&self) -> &str;

    /// Run this backend's logout sequence for the session.
    async fn on_logout(&self, session_id: &str) -> Result<()>;
}

/// Destroys a session in the host's session store.
#[async_trait]
pub trait SessionTerminator: Send + Sync {
    /// Invalidate the session.
    async fn destroy(&self, session_id: &str) -> Result<()>;
}

/// Configuration for denial handling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenialConfig {
    /// Safe landing page users are redirected to after denial.
    pub redirect: String,
}

impl Default for DenialConfig {
    fn default() -> Self {
        Self {
            redirect: "/".to_string(),
        }
    }
}

impl DenialConfig {
    /// Create a config with the given redirect target.
    #[must_use]
    pub fn new(redirect: impl Into<String>) -> Self {
        Self {
            redirect: redirect.into(),
        }
    }
}

/// Runs the full logout sequence when a user is denied.
///
/// # Example
///
/// ```rust,ignore
/// use factorgate::denial::{DenialConfig, DenialHandler};
///
/// let handler = DenialHandler::new(terminator)
///     .with_hook(Arc::new(SamlLogout::new(idp)))
///     .with_hook(Arc::new(OauthLogout::new(provider)))
///     .with_config(DenialConfig::new("/login"));
///
/// // In the login gate, when the user ran out of attempts:
/// return Err(handler.deny(session_id).await);
/// ```
pub struct DenialHandler<T: SessionTerminator> {
    hooks: Vec<Arc<dyn LogoutHook>>,
    terminator: T,
    config: DenialConfig,
}

impl<T: SessionTerminator> DenialHandler<T> {
    /// Create a handler with no hooks and the default config.
    #[must_use]
    pub fn new(terminator: T) -> Self {
        Self {
            hooks: Vec::new(),
            terminator,
            config: DenialConfig::default(),
        }
    }

    /// Register a logout hook for an authentication backend.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn LogoutHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Set the denial configuration.
    #[must_use]
    pub fn with_config(mut self, config: DenialConfig) -> Self {
        self.config = config;
        self
    }

    /// Deny the session: run every logout hook, destroy the session,
    /// and return the user-facing error to surface.
    ///
    /// A hook failure is logged and the remaining hooks still run; the
    /// session is destroyed regardless. The returned error carries the
    /// configured redirect so callers route the user to a safe landing
    /// page rather than a bare error screen.
    pub async fn deny(&self, session_id: &str) -> FactorGateError {
        for hook in &self.hooks {
            if let Err(err) = hook.on_logout(session_id).await {
                tracing::error!(
                    target: "mfa.denial.hook_failed",
                    hook = %hook.name(),
                    session_id = %session_id,
                    error = %err,
                    "Logout hook failed, continuing with remaining hooks"
                );
            }
        }

        if let Err(err) = self.terminator.destroy(session_id).await {
            tracing::error!(
                target: "mfa.denial.destroy_failed",
                session_id = %session_id,
                error = %err,
                "Could not destroy session during denial"
            );
        }

        tracing::warn!(
            target: "mfa.denial.denied",
            session_id = %session_id,
            redirect = %self.config.redirect,
            "User denied: not enough factors"
        );

        FactorGateError::InsufficientFactors {
            redirect: self.config.redirect.clone(),
        }
    }
}
