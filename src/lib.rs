//! Factorgate - weighted multi-factor authentication aggregation
//!
//! Factorgate combines independently-evaluated authentication factors,
//! each with an administrator-assigned weight, into one overall decision
//! for a session. Factors plug in through the [`FactorEvaluator`] trait;
//! the library owns the combination rules, the per-session decision
//! cache, ownership validation of factor-instance ids, and the denial
//! path.
//!
//! # Decision rules
//!
//! - Any explicitly failed factor fails the evaluation, regardless of
//!   the weight accumulated elsewhere.
//! - Otherwise, passing factors' weights are summed; 100 points passes.
//! - Anything else is neutral: keep collecting factors.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use factorgate::{Engine, FactorRegistry, MfaGate, OverallState};
//!
//! #[tokio::main]
//! async fn main() {
//!     factorgate::init_tracing();
//!
//!     let registry = FactorRegistry::new()
//!         .with_factor(Arc::new(PasswordFactor::new(60)))
//!         .with_factor(Arc::new(TotpFactor::new(40)));
//!
//!     let gate = MfaGate::new(Engine::new(Arc::new(registry)), decision_store);
//!
//!     match gate.check_status(session_id, user_id).await.unwrap() {
//!         OverallState::Pass => { /* let the request through */ }
//!         OverallState::Fail => { /* explicit factor failure */ }
//!         OverallState::Neutral => { /* prompt for more factors */ }
//!     }
//! }
//! ```

pub mod denial;
pub mod engine;
mod error;
pub mod factor;
pub mod gate;
pub mod ownership;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-exports for public API
pub use denial::{DenialConfig, DenialHandler, LogoutHook, SessionTerminator};
pub use engine::{
    aggregate, aggregate_with_threshold, passed_enough_factors, total_weight, Engine,
    FactorOutcome, OverallState, PASS_THRESHOLD,
};
pub use error::{FactorGateError, Result};
pub use factor::{ActiveUserFactor, FactorDescriptor, FactorEvaluator, FactorRegistry, FactorState};
pub use gate::{AuditEvent, AuditSink, DecisionStore, MfaGate, TracingAuditSink};
pub use ownership::{validate_factor_type, OwnershipStore, OwnershipValidator};
pub use report::{FactorReport, FactorReportRow, SetupStatus};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging with sensible defaults
///
/// Call this early in your application if the host does not already set
/// up a subscriber.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "factorgate=debug")
/// - `FACTORGATE_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("FACTORGATE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
