//! Factor descriptors, evaluation states, and the typed factor registry.
//!
//! A factor is one authentication method (password, TOTP, email code, ...)
//! with an administrator-assigned weight. Each factor type implements
//! [`FactorEvaluator`]; the concrete verification logic lives entirely on
//! the implementor's side. Evaluators are registered once at startup in a
//! [`FactorRegistry`] and resolved by type from then on, never dispatched
//! by string per call.
//!
//! # Example
//!
//! ```rust,ignore
//! use factorgate::factor::{FactorDescriptor, FactorEvaluator, FactorRegistry};
//!
//! let registry = FactorRegistry::new()
//!     .with_factor(Arc::new(PasswordFactor::new(FactorDescriptor::new("password", 60))))
//!     .with_factor(Arc::new(TotpFactor::new(FactorDescriptor::new("totp", 40).requires_setup())));
//!
//! let active = registry.active_for_user("user-1").await;
//! ```

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of evaluating a single factor for a user.
///
/// Exactly one state exists per (user, factor, evaluation) at a point in
/// time; states are only ever combined through the aggregation engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorState {
    /// The factor verified successfully and contributes its weight.
    Pass,
    /// The factor explicitly failed (e.g. a wrong TOTP code).
    Fail,
    /// The factor has no opinion yet (e.g. challenge not attempted).
    Neutral,
    /// The factor's state could not be determined.
    Unknown,
}

/// Immutable configuration for one factor type.
///
/// The set of descriptors is configuration, not user data: it is loaded
/// once and never mutated by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorDescriptor {
    /// Unique, stable identifier for the factor type.
    pub name: String,
    /// Contribution toward the pass threshold when the factor passes.
    pub weight: u32,
    /// Whether the factor needs explicit per-user setup before it is active.
    pub requires_setup: bool,
}

impl FactorDescriptor {
    /// Create a descriptor for a factor that needs no per-user setup.
    #[must_use]
    pub fn new(name: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            weight,
            requires_setup: false,
        }
    }

    /// Mark this factor as requiring explicit per-user setup.
    #[must_use]
    pub fn requires_setup(mut self) -> Self {
        self.requires_setup = true;
        self
    }
}

/// Trait for factor evaluators.
///
/// Implement this for each factor type. The engine only consumes the
/// contract below; how a factor decides its own state (database lookups,
/// network calls to a verification service, ...) is entirely up to the
/// implementor and may block for arbitrary time.
///
/// # Example
///
/// ```rust,ignore
/// use factorgate::factor::{FactorDescriptor, FactorEvaluator, FactorState};
/// use async_trait::async_trait;
///
/// struct EmailFactor {
///     descriptor: FactorDescriptor,
///     db: DatabaseConnection,
/// }
///
/// #[async_trait]
/// impl FactorEvaluator for EmailFactor {
///     fn descriptor(&self) -> &FactorDescriptor {
///         &self.descriptor
///     }
///
///     async fn state(&self, user_id: &str) -> Result<FactorState> {
///         // Query your verification records
///         Ok(self.db.email_code_state(user_id).await?)
///     }
/// }
/// ```
#[async_trait]
pub trait FactorEvaluator: Send + Sync {
    /// Static metadata for this factor type.
    fn descriptor(&self) -> &FactorDescriptor;

    /// Current state of this factor for the user.
    async fn state(&self, user_id: &str) -> Result<FactorState>;

    /// Whether the user has completed setup for this factor.
    ///
    /// Only consulted when the descriptor requires setup. The default
    /// implementation reports configured, which is correct for factors
    /// that work without per-user enrollment.
    async fn is_configured(&self, _user_id: &str) -> Result<bool> {
        Ok(true)
    }

    /// The factor's unique name.
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// The factor's configured weight.
    fn weight(&self) -> u32 {
        self.descriptor().weight
    }

    /// Whether this factor has a per-user setup step.
    fn has_setup(&self) -> bool {
        self.descriptor().requires_setup
    }
}

/// A factor instance active for a specific user.
///
/// Looked up by the engine at evaluation time, never mutated by it.
#[derive(Clone)]
pub struct ActiveUserFactor {
    /// The evaluator for this factor type.
    pub factor: Arc<dyn FactorEvaluator>,
    /// The user this instance belongs to.
    pub user_id: String,
}

/// Typed registry of factor evaluators, populated once at startup.
#[derive(Default)]
pub struct FactorRegistry {
    factors: Vec<Arc<dyn FactorEvaluator>>,
}

impl FactorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factor evaluator, builder style.
    #[must_use]
    pub fn with_factor(mut self, factor: Arc<dyn FactorEvaluator>) -> Self {
        self.register(factor);
        self
    }

    /// Register a factor evaluator.
    ///
    /// A second registration under an already-registered name is ignored;
    /// descriptor names are unique within a deployment.
    pub fn register(&mut self, factor: Arc<dyn FactorEvaluator>) {
        if self.get(factor.name()).is_some() {
            tracing::warn!(
                target: "mfa.registry.duplicate",
                factor = %factor.name(),
                "Ignoring duplicate factor registration"
            );
            return;
        }
        self.factors.push(factor);
    }

    /// All enabled factor types, in registration order.
    pub fn enabled(&self) -> &[Arc<dyn FactorEvaluator>] {
        &self.factors
    }

    /// Look up a factor evaluator by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn FactorEvaluator>> {
        self.factors.iter().find(|f| f.name() == name)
    }

    /// Number of registered factors.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Whether the registry has no factors.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Factors currently active for a user.
    ///
    /// A factor is active when it needs no setup, or when the user has
    /// completed its setup. A setup lookup failure excludes the factor
    /// for this evaluation (it cannot contribute weight it might not
    /// have) and is logged rather than propagated.
    pub async fn active_for_user(&self, user_id: &str) -> Vec<ActiveUserFactor> {
        let mut active = Vec::with_capacity(self.factors.len());
        for factor in &self.factors {
            let configured = if factor.has_setup() {
                match factor.is_configured(user_id).await {
                    Ok(configured) => configured,
                    Err(err) => {
                        tracing::warn!(
                            target: "mfa.registry.setup_lookup_failed",
                            factor = %factor.name(),
                            user_id = %user_id,
                            error = %err,
                            "Setup lookup failed, excluding factor from evaluation"
                        );
                        false
                    }
                }
            } else {
                true
            };

            if configured {
                active.push(ActiveUserFactor {
                    factor: Arc::clone(factor),
                    user_id: user_id.to_string(),
                });
            }
        }
        active
    }
}
