//! Weighted aggregation of factor outcomes.
//!
//! The engine combines independently-evaluated factor states into one
//! overall decision. Two rules apply, in order:
//!
//! 1. **Fail-fast**: any explicitly failed factor fails the whole
//!    evaluation, no matter how much weight the other factors carry.
//!    One wrong TOTP code cannot be outweighed.
//! 2. **Threshold**: otherwise, the weights of passing factors are
//!    summed; reaching [`PASS_THRESHOLD`] points passes.
//!
//! Anything else is [`OverallState::Neutral`]: not enough evidence either
//! way. Callers must not treat neutral as a denial, only as "keep
//! collecting factors".
//!
//! Factor evaluations may each perform blocking I/O, so they run
//! concurrently, but the decision is made only after every result is in
//! (collect-then-decide keeps the fail-fast rule deterministic).

use crate::factor::{FactorDescriptor, FactorRegistry, FactorState};
use crate::report::{FactorReport, FactorReportRow, SetupStatus};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Weight a user must accumulate from passing factors to authenticate.
///
/// Expressed in abstract points so administrators can assign any
/// combination of factor weights (two at 50, one at 100, ...) without
/// code changes.
pub const PASS_THRESHOLD: u32 = 100;

/// The aggregation engine's decision for one evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallState {
    /// Enough weight accumulated, no failures.
    Pass,
    /// At least one factor explicitly failed.
    Fail,
    /// Not enough evidence either way yet.
    Neutral,
}

/// One factor's contribution to an evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FactorOutcome {
    /// The factor's configuration.
    pub descriptor: FactorDescriptor,
    /// The state the factor reported for this evaluation.
    pub state: FactorState,
}

impl FactorOutcome {
    /// Pair a descriptor with its evaluated state.
    #[must_use]
    pub fn new(descriptor: FactorDescriptor, state: FactorState) -> Self {
        Self { descriptor, state }
    }
}

/// Total achieved weight: the sum of weights over passing outcomes.
///
/// Each descriptor is counted at most once, so duplicate entries for the
/// same factor type cannot double-count. Failed, neutral and unknown
/// factors contribute zero, never negative.
pub fn total_weight(outcomes: &[FactorOutcome]) -> u32 {
    let mut seen = HashSet::new();
    outcomes
        .iter()
        .filter(|o| o.state == FactorState::Pass)
        .filter(|o| seen.insert(o.descriptor.name.as_str()))
        .map(|o| o.descriptor.weight)
        .sum()
}

/// Whether the passing outcomes reach the default pass threshold.
pub fn passed_enough_factors(outcomes: &[FactorOutcome]) -> bool {
    total_weight(outcomes) >= PASS_THRESHOLD
}

/// Aggregate a set of factor outcomes under the default threshold.
pub fn aggregate(outcomes: &[FactorOutcome]) -> OverallState {
    aggregate_with_threshold(outcomes, PASS_THRESHOLD)
}

/// Aggregate a set of factor outcomes under a specific threshold.
///
/// The fail-fast check runs first and unconditionally: it is a security
/// invariant, not a tunable.
pub fn aggregate_with_threshold(outcomes: &[FactorOutcome], threshold: u32) -> OverallState {
    if outcomes.iter().any(|o| o.state == FactorState::Fail) {
        return OverallState::Fail;
    }
    if total_weight(outcomes) >= threshold {
        OverallState::Pass
    } else {
        OverallState::Neutral
    }
}

/// Evaluates the active factors of a user and aggregates the result.
///
/// The engine itself holds no per-user or per-session state; everything
/// it needs is passed into each call.
///
/// # Example
///
/// ```rust,ignore
/// use factorgate::engine::{Engine, OverallState};
///
/// let engine = Engine::new(registry);
/// match engine.evaluate("user-1").await? {
///     OverallState::Pass => { /* let them in */ }
///     OverallState::Fail => { /* a factor was explicitly failed */ }
///     OverallState::Neutral => { /* prompt for more factors */ }
/// }
/// ```
pub struct Engine {
    registry: Arc<FactorRegistry>,
    threshold: u32,
}

impl Engine {
    /// Create an engine over a registry with the default pass threshold.
    #[must_use]
    pub fn new(registry: Arc<FactorRegistry>) -> Self {
        Self {
            registry,
            threshold: PASS_THRESHOLD,
        }
    }

    /// Override the pass threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// The registry this engine evaluates over.
    pub fn registry(&self) -> &FactorRegistry {
        &self.registry
    }

    /// Collect current states for every factor active for the user.
    ///
    /// Evaluations run concurrently since they are read-only and
    /// independent. An evaluator error demotes that factor to
    /// [`FactorState::Unknown`] (logged, excluded from the weight sum,
    /// never fatal to the evaluation as a whole).
    pub async fn outcomes(&self, user_id: &str) -> Vec<FactorOutcome> {
        let active = self.registry.active_for_user(user_id).await;
        let states = join_all(active.iter().map(|af| af.factor.state(user_id))).await;

        active
            .iter()
            .zip(states)
            .map(|(af, state)| {
                let state = state.unwrap_or_else(|err| {
                    tracing::warn!(
                        target: "mfa.engine.evaluator_unavailable",
                        factor = %af.factor.name(),
                        user_id = %user_id,
                        error = %err,
                        "Factor evaluator could not produce a state, treating as unknown"
                    );
                    FactorState::Unknown
                });
                FactorOutcome::new(af.factor.descriptor().clone(), state)
            })
            .collect()
    }

    /// Evaluate the user's active factors into one overall decision.
    pub async fn evaluate(&self, user_id: &str) -> OverallState {
        let outcomes = self.outcomes(user_id).await;
        let overall = aggregate_with_threshold(&outcomes, self.threshold);

        tracing::debug!(
            target: "mfa.engine.evaluated",
            user_id = %user_id,
            factors = outcomes.len(),
            total_weight = total_weight(&outcomes),
            overall = ?overall,
            "Evaluated active factors"
        );

        overall
    }

    /// Total achieved weight for the user's current active factors.
    pub async fn total_weight_for(&self, user_id: &str) -> u32 {
        total_weight(&self.outcomes(user_id).await)
    }

    /// Build a structured status report over all enabled factors.
    ///
    /// Inactive factors (setup required but not completed) are reported
    /// as [`FactorState::Unknown`] and contribute nothing. The overall
    /// row reflects only the threshold, not the fail-fast rule, mirroring
    /// what a setup/debug screen shows mid-flow.
    pub async fn report(&self, user_id: &str) -> FactorReport {
        let mut rows = Vec::with_capacity(self.registry.len());
        let mut total = 0u32;

        for factor in self.registry.enabled() {
            let descriptor = factor.descriptor();

            let setup = if !descriptor.requires_setup {
                SetupStatus::NotRequired
            } else if factor.is_configured(user_id).await.unwrap_or(false) {
                SetupStatus::Complete
            } else {
                SetupStatus::Incomplete
            };

            let state = if setup == SetupStatus::Incomplete {
                FactorState::Unknown
            } else {
                factor.state(user_id).await.unwrap_or(FactorState::Unknown)
            };

            let achieved = if state == FactorState::Pass {
                descriptor.weight
            } else {
                0
            };
            total += achieved;

            rows.push(FactorReportRow {
                name: descriptor.name.clone(),
                weight: descriptor.weight,
                setup,
                achieved,
                state,
            });
        }

        let overall = if total >= self.threshold {
            FactorState::Pass
        } else {
            FactorState::Unknown
        };

        FactorReport {
            rows,
            total_weight: total,
            overall,
        }
    }
}
