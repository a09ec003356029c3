use failsafe::{backoff, failure_policy};
use std::time::Duration;

/// Circuit breaker type guarding the generative-AI upstream.
pub type AiCircuitBreaker = failsafe::StateMachine<
    failure_policy::ConsecutiveFailures<backoff::Exponential>,
    (),
>;

/// Creates the circuit breaker for AI generation calls.
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: exponential from 10s to 60s before attempting recovery.
///
/// While OPEN, requests fail fast and surface to the caller as a retryable
/// 503 instead of queueing behind a dead upstream.
pub fn create_ai_circuit_breaker() -> AiCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    failsafe::Config::new()
        .failure_policy(failure_policy)
        .build()
}
