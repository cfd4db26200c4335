//! Structured per-factor status report.
//!
//! Hosts render this however they like (an admin debug table, a login
//! progress screen, a JSON payload); no markup is produced here. Built by
//! [`Engine::report`](crate::engine::Engine::report).

use crate::factor::FactorState;
use serde::Serialize;

/// Setup progress for a factor, from the reported user's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStatus {
    /// The factor works without per-user enrollment.
    NotRequired,
    /// The user has completed setup.
    Complete,
    /// Setup is required but the user has not completed it.
    Incomplete,
}

/// One enabled factor's line in the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FactorReportRow {
    /// Factor type name.
    pub name: String,
    /// Configured weight.
    pub weight: u32,
    /// Setup progress for the user.
    pub setup: SetupStatus,
    /// Weight actually achieved (the configured weight if passing, else 0).
    pub achieved: u32,
    /// Current state of the factor for the user.
    pub state: FactorState,
}

/// Full status report for a user across all enabled factors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FactorReport {
    /// One row per enabled factor, in registration order.
    pub rows: Vec<FactorReportRow>,
    /// Sum of achieved weights.
    pub total_weight: u32,
    /// Threshold verdict: `Pass` once enough weight is achieved,
    /// `Unknown` otherwise.
    pub overall: FactorState,
}

impl FactorReport {
    /// Whether the report shows the user past the threshold.
    pub fn is_passing(&self) -> bool {
        self.overall == FactorState::Pass
    }
}
