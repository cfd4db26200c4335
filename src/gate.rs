//! Session decision cache and the MFA gate.
//!
//! The gate wraps the aggregation engine with a per-session memo of a
//! reached pass decision. Once a session passes, subsequent checks
//! short-circuit without re-running factor evaluators, and exactly one
//! audit event is emitted on the transition.
//!
//! # Tracing Events
//!
//! - `mfa.gate.passed` - A session crossed the pass threshold
//! - `mfa.gate.cached` - A check was answered from the session cache
//! - `mfa.gate.invalidated` - A session's cached decision was cleared
//! - `mfa.audit` - Audit events from the default [`TracingAuditSink`]
//!
//! # Example
//!
//! ```rust,ignore
//! use factorgate::gate::MfaGate;
//!
//! let gate = MfaGate::new(engine, decision_store);
//! match gate.check_status("session-1", "user-1").await? {
//!     OverallState::Pass => { /* proceed */ }
//!     OverallState::Fail => { /* a factor was explicitly failed */ }
//!     OverallState::Neutral => { /* prompt for another factor */ }
//! }
//! ```

use crate::engine::{Engine, OverallState};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Audit events emitted by the gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The user crossed the pass threshold for this session.
    UserPassedMfa {
        /// The user the decision was reached for.
        user_id: String,
    },
}

impl AuditEvent {
    /// Stable event name, suitable for log pipelines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserPassedMfa { .. } => "user_passed_mfa",
        }
    }

    /// The user this event concerns.
    pub fn user_id(&self) -> &str {
        match self {
            Self::UserPassedMfa { user_id } => user_id,
        }
    }
}

/// Trait for audit event sinks.
///
/// Implement this to forward gate transitions to your event pipeline
/// (database audit table, message bus, SIEM forwarder, ...).
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    async fn emit(&self, event: AuditEvent) -> Result<()>;
}

#[async_trait]
impl<A: AuditSink + ?Sized> AuditSink for Arc<A> {
    async fn emit(&self, event: AuditEvent) -> Result<()> {
        (**self).emit(event).await
    }
}

/// Default audit sink: structured tracing under the `mfa.audit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, event: AuditEvent) -> Result<()> {
        tracing::info!(
            target: "mfa.audit",
            event = event.name(),
            user_id = %event.user_id(),
            "MFA audit event"
        );
        Ok(())
    }
}

/// Trait for the per-session decision cache.
///
/// Implement this over your host's session storage. The flag is
/// write-once within a session's lifetime: the gate never resets it, only
/// session end (or an explicit [`MfaGate::invalidate`]) clears it.
///
/// # Example
///
/// ```rust,ignore
/// use factorgate::gate::DecisionStore;
/// use async_trait::async_trait;
///
/// struct RedisDecisionStore {
///     client: redis::Client,
/// }
///
/// #[async_trait]
/// impl DecisionStore for RedisDecisionStore {
///     async fn mark_authenticated(&self, session_id: &str) -> Result<bool> {
///         // SETNX gives the compare-and-set semantics for free
///         Ok(self.client.set_nx(decision_key(session_id), true).await?)
///     }
///
///     // ... implement other methods
/// }
/// ```
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Whether the session already holds a cached pass.
    async fn is_authenticated(&self, session_id: &str) -> Result<bool>;

    /// Set the cached pass flag if it is not already set.
    ///
    /// Must behave as a compare-and-set: returns `true` iff this call
    /// performed the unset-to-set transition. Under concurrent requests
    /// in one session, exactly one caller may see `true`.
    async fn mark_authenticated(&self, session_id: &str) -> Result<bool>;

    /// Remove the cached decision (logout, expiry, or host-driven
    /// revalidation).
    async fn clear(&self, session_id: &str) -> Result<()>;
}

/// The MFA gate: engine plus session decision cache plus audit.
pub struct MfaGate<D: DecisionStore, A: AuditSink = TracingAuditSink> {
    engine: Engine,
    decisions: D,
    audit: A,
}

impl<D: DecisionStore> MfaGate<D, TracingAuditSink> {
    /// Create a gate with the default tracing audit sink.
    #[must_use]
    pub fn new(engine: Engine, decisions: D) -> Self {
        Self {
            engine,
            decisions,
            audit: TracingAuditSink,
        }
    }
}

impl<D: DecisionStore, A: AuditSink> MfaGate<D, A> {
    /// Replace the audit sink.
    #[must_use]
    pub fn with_audit_sink<B: AuditSink>(self, audit: B) -> MfaGate<D, B> {
        MfaGate {
            engine: self.engine,
            decisions: self.decisions,
            audit,
        }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Overall authentication status for the session.
    ///
    /// A cached pass answers immediately, without touching any factor
    /// evaluator. Otherwise the engine evaluates the user's active
    /// factors; a pass result is persisted into the session and audited
    /// exactly once per session lifetime. Fail and neutral results never
    /// touch the cache, so a later factor attempt can still change the
    /// outcome.
    pub async fn check_status(&self, session_id: &str, user_id: &str) -> Result<OverallState> {
        match self.decisions.is_authenticated(session_id).await {
            Ok(true) => {
                tracing::debug!(
                    target: "mfa.gate.cached",
                    session_id = %session_id,
                    user_id = %user_id,
                    "Returning cached pass decision"
                );
                return Ok(OverallState::Pass);
            }
            Ok(false) => {}
            // A cache read failure only costs a redundant re-evaluation.
            Err(err) => {
                tracing::warn!(
                    target: "mfa.gate.cache_read_failed",
                    session_id = %session_id,
                    error = %err,
                    "Decision cache unreadable, re-evaluating factors"
                );
            }
        }

        let overall = self.engine.evaluate(user_id).await;

        if overall == OverallState::Pass {
            self.record_pass(session_id, user_id).await;
        }

        Ok(overall)
    }

    /// Persist the pass transition and emit the audit event if this call
    /// won the compare-and-set.
    async fn record_pass(&self, session_id: &str, user_id: &str) {
        match self.decisions.mark_authenticated(session_id).await {
            Ok(true) => {
                tracing::info!(
                    target: "mfa.gate.passed",
                    session_id = %session_id,
                    user_id = %user_id,
                    "User passed MFA"
                );
                let event = AuditEvent::UserPassedMfa {
                    user_id: user_id.to_string(),
                };
                if let Err(err) = self.audit.emit(event).await {
                    tracing::error!(
                        target: "mfa.gate.audit_failed",
                        session_id = %session_id,
                        user_id = %user_id,
                        error = %err,
                        "Audit sink rejected pass event"
                    );
                }
            }
            // Another request in this session already recorded the
            // transition and emitted the event.
            Ok(false) => {}
            // The pass still stands for this call; the flag was not set,
            // so the next check re-evaluates and retries the transition.
            Err(err) => {
                tracing::error!(
                    target: "mfa.gate.cache_write_failed",
                    session_id = %session_id,
                    user_id = %user_id,
                    error = %err,
                    "Could not persist pass decision"
                );
            }
        }
    }

    /// Clear the session's cached decision, forcing full re-evaluation on
    /// the next check.
    ///
    /// The gate itself caches a pass for the session's whole lifetime;
    /// hosts that must re-validate after a credential revocation call
    /// this explicitly.
    pub async fn invalidate(&self, session_id: &str) -> Result<()> {
        self.decisions.clear(session_id).await?;
        tracing::info!(
            target: "mfa.gate.invalidated",
            session_id = %session_id,
            "Cached MFA decision cleared"
        );
        Ok(())
    }
}
