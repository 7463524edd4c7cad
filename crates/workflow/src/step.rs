//! Step retry runner.
//!
//! Every pipeline step runs through [`StepRunner::run`]: up to
//! `max_attempts` tries with exponential backoff between them
//! (`base * 2^attempt`, so 2 s then 4 s with the default 1 s base).

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::{ExecutionContext, ServiceBindings};
use crate::error::EngineError;

/// The work a step performs.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &mut ExecutionContext,
        services: &ServiceBindings,
    ) -> Result<(), EngineError>;
}

/// A named unit of pipeline work with its own retry budget.
pub struct Step {
    pub name: &'static str,
    pub max_attempts: u32,
    handler: Box<dyn StepHandler>,
}

impl Step {
    pub fn new(name: &'static str, max_attempts: u32, handler: Box<dyn StepHandler>) -> Self {
        Self {
            name,
            max_attempts: max_attempts.max(1),
            handler,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StepRunner {
    backoff_base: Duration,
}

impl StepRunner {
    pub fn new(backoff_base: Duration) -> Self {
        Self { backoff_base }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `step` until it succeeds or its attempts run out.
    pub async fn run(
        &self,
        step: &Step,
        ctx: &mut ExecutionContext,
        services: &ServiceBindings,
    ) -> Result<(), EngineError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(step = step.name, attempt, "Running step");

            let error = match step.handler.handle(ctx, services).await {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_retryable() => {
                    debug!(step = step.name, error = %e, "Step rejected input");
                    return Err(e);
                }
                Err(e) => e,
            };

            if attempt >= step.max_attempts {
                warn!(step = step.name, attempts = attempt, error = %error, "Step exhausted");
                return Err(EngineError::StepExhausted {
                    step: step.name.to_string(),
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }

            let delay = self.backoff(attempt);
            warn!(
                step = step.name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Step failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for StepRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineInput;
    use crate::test_helpers::services;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    /// Fails `failures` times, then succeeds. Records when each call began.
    struct Flaky {
        failures: u32,
        calls: Arc<AtomicU32>,
        started: Arc<Mutex<Vec<Instant>>>,
        error: fn() -> EngineError,
    }

    impl Flaky {
        fn step(
            failures: u32,
            max_attempts: u32,
            error: fn() -> EngineError,
        ) -> (Step, Arc<AtomicU32>, Arc<Mutex<Vec<Instant>>>) {
            let calls = Arc::new(AtomicU32::new(0));
            let started = Arc::new(Mutex::new(Vec::new()));
            let handler = Flaky {
                failures,
                calls: calls.clone(),
                started: started.clone(),
                error,
            };
            (Step::new("flaky", max_attempts, Box::new(handler)), calls, started)
        }
    }

    #[async_trait]
    impl StepHandler for Flaky {
        async fn handle(
            &self,
            _: &mut ExecutionContext,
            _: &ServiceBindings,
        ) -> Result<(), EngineError> {
            self.started.lock().await.push(Instant::now());
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
    }

    /// The paused clock lands on timer ticks, so allow a millisecond.
    fn assert_delay(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual <= expected + Duration::from_millis(1),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    fn internal() -> EngineError {
        EngineError::Internal("boom".into())
    }

    fn invalid() -> EngineError {
        EngineError::Validation("empty".into())
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(PipelineInput::new("hi", "s1"))
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_step_runs_three_times_with_backoff() {
        let (step, calls, started) = Flaky::step(u32::MAX, 3, internal);
        let err = StepRunner::default()
            .run(&step, &mut ctx(), &services(vec![]))
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            EngineError::StepExhausted { step, attempts, .. } => {
                assert_eq!(step, "flaky");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected StepExhausted, got {other:?}"),
        }

        let started = started.lock().await;
        assert_delay(started[1] - started[0], Duration::from_secs(2));
        assert_delay(started[2] - started[1], Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_retry_returns_ok() {
        let (step, calls, _) = Flaky::step(1, 3, internal);
        StepRunner::default()
            .run(&step, &mut ctx(), &services(vec![]))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn validation_error_is_not_retried() {
        let (step, calls, _) = Flaky::step(u32::MAX, 3, invalid);
        let start = Instant::now();
        let err = StepRunner::default()
            .run(&step, &mut ctx(), &services(vec![]))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[test]
    fn backoff_doubles() {
        let runner = StepRunner::new(Duration::from_millis(500));
        assert_eq!(runner.backoff(1), Duration::from_secs(1));
        assert_eq!(runner.backoff(2), Duration::from_secs(2));
        assert_eq!(runner.backoff(3), Duration::from_secs(4));
    }
}
