//! End-to-end tests for the MFA gate: aggregation scenarios, session
//! caching, ownership validation, and denial handling.

use std::sync::Arc;

use factorgate::test_support::{
    InMemoryDecisionStore, InMemoryOwnershipStore, RecordingAuditSink, RecordingLogoutHook,
    RecordingTerminator, StaticFactor,
};
use factorgate::{
    DenialConfig, DenialHandler, Engine, FactorGateError, FactorRegistry, FactorState, MfaGate,
    OverallState, OwnershipValidator,
};

fn engine_with(factors: Vec<StaticFactor>) -> Engine {
    let mut registry = FactorRegistry::new();
    for factor in factors {
        registry.register(Arc::new(factor));
    }
    Engine::new(Arc::new(registry))
}

#[tokio::test]
async fn single_full_weight_factor_passes() {
    // Scenario A: {A: weight 100, PASS} => PASS.
    let engine = engine_with(vec![StaticFactor::passing("password", 100)]);
    assert_eq!(engine.evaluate("user-1").await, OverallState::Pass);
}

#[tokio::test]
async fn explicit_failure_beats_passing_weight() {
    // Scenario B: {A: 60 PASS, B: 60 FAIL} => FAIL.
    let engine = engine_with(vec![
        StaticFactor::passing("password", 60),
        StaticFactor::failing("totp", 60),
    ]);
    assert_eq!(engine.evaluate("user-1").await, OverallState::Fail);
}

#[tokio::test]
async fn below_threshold_stays_neutral() {
    // Scenario C: {A: 50 PASS, B: 40 PASS} => 90 < 100 => NEUTRAL.
    let engine = engine_with(vec![
        StaticFactor::passing("password", 50),
        StaticFactor::passing("totp", 40),
    ]);
    assert_eq!(engine.evaluate("user-1").await, OverallState::Neutral);
    assert_eq!(engine.total_weight_for("user-1").await, 90);
}

#[tokio::test]
async fn exact_threshold_passes() {
    // Scenario D: {A: 50 PASS, B: 50 PASS} => 100 => PASS.
    let engine = engine_with(vec![
        StaticFactor::passing("password", 50),
        StaticFactor::passing("totp", 50),
    ]);
    assert_eq!(engine.evaluate("user-1").await, OverallState::Pass);
}

#[tokio::test]
async fn no_active_factors_is_neutral() {
    // Scenario E: nothing registered => weight 0 => NEUTRAL.
    let engine = engine_with(Vec::new());
    assert_eq!(engine.evaluate("user-1").await, OverallState::Neutral);
    assert_eq!(engine.total_weight_for("user-1").await, 0);
}

#[tokio::test]
async fn failure_beats_weight_even_past_threshold() {
    let engine = engine_with(vec![
        StaticFactor::passing("password", 100),
        StaticFactor::passing("email", 100),
        StaticFactor::failing("totp", 10),
    ]);
    assert_eq!(engine.evaluate("user-1").await, OverallState::Fail);
}

#[tokio::test]
async fn unconfigured_factor_contributes_nothing() {
    let engine = engine_with(vec![
        StaticFactor::passing("password", 60),
        StaticFactor::passing("totp", 40).needs_setup(false),
    ]);
    assert_eq!(engine.evaluate("user-1").await, OverallState::Neutral);
    assert_eq!(engine.total_weight_for("user-1").await, 60);
}

#[tokio::test]
async fn cached_pass_skips_evaluators_and_audits_once() {
    let password = Arc::new(StaticFactor::passing("password", 100));
    let registry = FactorRegistry::new().with_factor(password.clone());
    let audit = Arc::new(RecordingAuditSink::new());
    let gate = MfaGate::new(
        Engine::new(Arc::new(registry)),
        InMemoryDecisionStore::new(),
    )
    .with_audit_sink(audit.clone());

    for _ in 0..5 {
        assert_eq!(
            gate.check_status("session-1", "user-1").await.unwrap(),
            OverallState::Pass
        );
    }

    // One evaluation, one audit event, four cache hits.
    assert_eq!(password.evaluations(), 1);
    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "user_passed_mfa");
    assert_eq!(events[0].user_id(), "user-1");
}

#[tokio::test]
async fn cached_pass_survives_later_factor_failure() {
    // Scenario F: the cache is write-once and not reconsulted once set.
    let store = InMemoryDecisionStore::new();
    let registry = FactorRegistry::new()
        .with_factor(Arc::new(StaticFactor::passing("password", 100)))
        .with_factor(Arc::new(StaticFactor::failing("totp", 40)));

    // Pre-seed the cached pass, as if the user authenticated before the
    // failing factor appeared.
    use factorgate::DecisionStore;
    assert!(store.mark_authenticated("session-1").await.unwrap());

    let gate = MfaGate::new(Engine::new(Arc::new(registry)), store);
    assert_eq!(
        gate.check_status("session-1", "user-1").await.unwrap(),
        OverallState::Pass
    );
}

#[tokio::test]
async fn invalidated_session_reevaluates_and_fails() {
    // The other reading of the revocation question: hosts that need
    // re-validation clear the cache and get a fresh verdict.
    let store = InMemoryDecisionStore::new();
    use factorgate::DecisionStore;
    assert!(store.mark_authenticated("session-1").await.unwrap());

    let registry =
        FactorRegistry::new().with_factor(Arc::new(StaticFactor::failing("totp", 100)));
    let gate = MfaGate::new(Engine::new(Arc::new(registry)), store);

    gate.invalidate("session-1").await.unwrap();
    assert_eq!(
        gate.check_status("session-1", "user-1").await.unwrap(),
        OverallState::Fail
    );
}

#[tokio::test]
async fn neutral_then_pass_transitions_once() {
    // A user mid-flow: first check is neutral, then the second factor
    // passes and the session transitions exactly once.
    let totp = Arc::new(StaticFactor::with_state("totp", 50, FactorState::Neutral));
    let registry = FactorRegistry::new()
        .with_factor(Arc::new(StaticFactor::passing("password", 50)))
        .with_factor(totp.clone());
    let gate = MfaGate::new(
        Engine::new(Arc::new(registry)),
        InMemoryDecisionStore::new(),
    );

    assert_eq!(
        gate.check_status("session-1", "user-1").await.unwrap(),
        OverallState::Neutral
    );

    // The user completes the TOTP challenge.
    totp.set_state(FactorState::Pass);
    assert_eq!(
        gate.check_status("session-1", "user-1").await.unwrap(),
        OverallState::Pass
    );

    // Further checks are cache hits.
    assert_eq!(totp.evaluations(), 2);
    assert_eq!(
        gate.check_status("session-1", "user-1").await.unwrap(),
        OverallState::Pass
    );
    assert_eq!(totp.evaluations(), 2);
}

#[tokio::test]
async fn failed_factor_can_recover_to_pass() {
    // A FAIL is never cached: a later successful attempt flips the
    // session to PASS.
    let totp = Arc::new(StaticFactor::failing("totp", 100));
    let registry = FactorRegistry::new().with_factor(totp.clone());
    let gate = MfaGate::new(
        Engine::new(Arc::new(registry)),
        InMemoryDecisionStore::new(),
    );

    assert_eq!(
        gate.check_status("session-1", "user-1").await.unwrap(),
        OverallState::Fail
    );

    totp.set_state(FactorState::Pass);
    assert_eq!(
        gate.check_status("session-1", "user-1").await.unwrap(),
        OverallState::Pass
    );
}

#[tokio::test]
async fn evaluator_outage_never_upgrades_to_pass() {
    let engine = engine_with(vec![
        StaticFactor::passing("password", 50),
        StaticFactor::unavailable("totp", 50),
    ]);
    // The unavailable factor's weight is excluded; 50 < 100.
    assert_eq!(engine.evaluate("user-1").await, OverallState::Neutral);
}

#[tokio::test]
async fn ownership_matrix() {
    let store = InMemoryOwnershipStore::new();
    store.insert("totp", 7, "user-1");
    store.insert("totp", 8, "user-2");
    let validator = OwnershipValidator::new(store);

    // Owned by the exact user queried.
    assert!(validator.is_owned_by("totp", 7, "user-1").await);
    // Owned by a different user.
    assert!(!validator.is_owned_by("totp", 8, "user-1").await);
    // Absent instance id.
    assert!(!validator.is_owned_by("totp", 9, "user-1").await);
    // Wrong namespace.
    assert!(!validator.is_owned_by("email", 7, "user-1").await);
    // Malformed type name.
    assert!(!validator.is_owned_by("../totp", 7, "user-1").await);
}

#[tokio::test]
async fn denial_runs_full_logout_sequence() {
    let saml = Arc::new(RecordingLogoutHook::new("saml").failing());
    let oauth = Arc::new(RecordingLogoutHook::new("oauth"));
    let terminator = RecordingTerminator::new();

    let handler = DenialHandler::new(terminator)
        .with_hook(saml.clone())
        .with_hook(oauth.clone())
        .with_config(DenialConfig::new("/login"));

    let err = handler.deny("session-1").await;

    // Both hooks ran despite the first failing, the session died, and
    // the caller got the user-facing redirect error.
    assert_eq!(saml.calls(), 1);
    assert_eq!(oauth.calls(), 1);
    assert!(matches!(
        err,
        FactorGateError::InsufficientFactors { redirect } if redirect == "/login"
    ));
}

#[tokio::test]
async fn report_tracks_login_progress() {
    let registry = FactorRegistry::new()
        .with_factor(Arc::new(StaticFactor::passing("password", 60)))
        .with_factor(Arc::new(StaticFactor::with_state(
            "email",
            40,
            FactorState::Neutral,
        )));
    let engine = Engine::new(Arc::new(registry));

    let report = engine.report("user-1").await;
    assert_eq!(report.total_weight, 60);
    assert!(!report.is_passing());
    assert_eq!(report.rows[0].achieved, 60);
    assert_eq!(report.rows[1].achieved, 0);
}
