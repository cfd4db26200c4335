//! In-memory collaborators for tests and examples.
//!
//! Available behind the `test-support` feature.
//!
//! **Note:** These implementations are intended for testing only.
//! Production hosts implement the storage traits over their own session
//! store and database.

use crate::error::{FactorGateError, Result};
use crate::factor::{FactorDescriptor, FactorEvaluator, FactorState};
use crate::gate::{AuditEvent, AuditSink, DecisionStore};
use crate::denial::{LogoutHook, SessionTerminator};
use crate::ownership::OwnershipStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

/// A factor evaluator with a scripted outcome.
///
/// Counts evaluator invocations so tests can assert that cached
/// decisions never re-run evaluation, and allows flipping the reported
/// state mid-test to model a user completing (or failing) a challenge.
pub struct StaticFactor {
    descriptor: FactorDescriptor,
    /// `None` simulates an unavailable evaluator.
    outcome: Mutex<Option<FactorState>>,
    configured: bool,
    setup_lookup_fails: bool,
    evaluations: AtomicUsize,
}

impl StaticFactor {
    /// A factor that reports the given state, no setup required.
    #[must_use]
    pub fn with_state(name: &str, weight: u32, state: FactorState) -> Self {
        Self {
            descriptor: FactorDescriptor::new(name, weight),
            outcome: Mutex::new(Some(state)),
            configured: true,
            setup_lookup_fails: false,
            evaluations: AtomicUsize::new(0),
        }
    }

    /// A factor that always passes.
    #[must_use]
    pub fn passing(name: &str, weight: u32) -> Self {
        Self::with_state(name, weight, FactorState::Pass)
    }

    /// A factor that always fails.
    #[must_use]
    pub fn failing(name: &str, weight: u32) -> Self {
        Self::with_state(name, weight, FactorState::Fail)
    }

    /// A factor whose evaluator errors on every call.
    #[must_use]
    pub fn unavailable(name: &str, weight: u32) -> Self {
        Self {
            descriptor: FactorDescriptor::new(name, weight),
            outcome: Mutex::new(None),
            configured: true,
            setup_lookup_fails: false,
            evaluations: AtomicUsize::new(0),
        }
    }

    /// Change the state the factor reports from now on.
    pub fn set_state(&self, state: FactorState) {
        *self.outcome.lock().unwrap() = Some(state);
    }

    /// Mark the factor as requiring setup, with the given completion
    /// state for every user.
    #[must_use]
    pub fn needs_setup(mut self, configured: bool) -> Self {
        self.descriptor = self.descriptor.requires_setup();
        self.configured = configured;
        self
    }

    /// Mark the factor as requiring setup, with the setup lookup itself
    /// erroring.
    #[must_use]
    pub fn failing_setup_lookup(mut self) -> Self {
        self.descriptor = self.descriptor.requires_setup();
        self.setup_lookup_fails = true;
        self
    }

    /// How many times `state` has been called.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactorEvaluator for StaticFactor {
    fn descriptor(&self) -> &FactorDescriptor {
        &self.descriptor
    }

    async fn state(&self, _user_id: &str) -> Result<FactorState> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        self.outcome.lock().unwrap().ok_or_else(|| {
            FactorGateError::evaluator_unavailable(&self.descriptor.name, "simulated outage")
        })
    }

    async fn is_configured(&self, _user_id: &str) -> Result<bool> {
        if self.setup_lookup_fails {
            return Err(FactorGateError::storage("simulated setup lookup failure"));
        }
        Ok(self.configured)
    }
}

/// In-memory session decision cache.
///
/// Thread-safe via a single `RwLock`; the write lock gives
/// `mark_authenticated` its compare-and-set semantics.
#[derive(Default)]
pub struct InMemoryDecisionStore {
    authenticated: RwLock<HashSet<String>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl InMemoryDecisionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail, for persistence-failure tests.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent reads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DecisionStore for InMemoryDecisionStore {
    async fn is_authenticated(&self, session_id: &str) -> Result<bool> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(FactorGateError::storage("simulated cache read failure"));
        }
        Ok(self.authenticated.read().unwrap().contains(session_id))
    }

    async fn mark_authenticated(&self, session_id: &str) -> Result<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FactorGateError::persistence(
                "simulated cache write failure",
            ));
        }
        Ok(self
            .authenticated
            .write()
            .unwrap()
            .insert(session_id.to_string()))
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.authenticated.write().unwrap().remove(session_id);
        Ok(())
    }
}

/// In-memory ownership store keyed by (factor type, instance id).
#[derive(Default)]
pub struct InMemoryOwnershipStore {
    owners: RwLock<HashMap<(String, i64), String>>,
    fail_lookups: AtomicBool,
    lookups: AtomicUsize,
}

impl InMemoryOwnershipStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an instance as owned by a user.
    pub fn insert(&self, factor_type: &str, instance_id: i64, owner: &str) {
        self.owners
            .write()
            .unwrap()
            .insert((factor_type.to_string(), instance_id), owner.to_string());
    }

    /// Make subsequent lookups fail.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// How many lookups have been attempted.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OwnershipStore for InMemoryOwnershipStore {
    async fn find_owner(&self, factor_type: &str, instance_id: i64) -> Result<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(FactorGateError::storage("simulated lookup failure"));
        }
        Ok(self
            .owners
            .read()
            .unwrap()
            .get(&(factor_type.to_string(), instance_id))
            .cloned())
    }
}

/// Audit sink that records emitted events.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events emitted so far, in order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn emit(&self, event: AuditEvent) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Logout hook that counts invocations and can simulate failure.
pub struct RecordingLogoutHook {
    name: String,
    fails: bool,
    calls: AtomicUsize,
}

impl RecordingLogoutHook {
    /// Create a hook with the given backend name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fails: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Make the hook fail on every call.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fails = true;
        self
    }

    /// How many times the hook has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogoutHook for RecordingLogoutHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_logout(&self, _session_id: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(FactorGateError::storage("simulated logout failure"));
        }
        Ok(())
    }
}

/// Session terminator that records destroyed session ids.
#[derive(Default)]
pub struct RecordingTerminator {
    destroyed: Mutex<Vec<String>>,
}

impl RecordingTerminator {
    /// Create an empty terminator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session ids destroyed so far, in order.
    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionTerminator for RecordingTerminator {
    async fn destroy(&self, session_id: &str) -> Result<()> {
        self.destroyed.lock().unwrap().push(session_id.to_string());
        Ok(())
    }
}
