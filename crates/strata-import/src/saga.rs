//! Prepare/commit/rollback coordination across independent resources.
//!
//! Steps prepare in order. If one fails, that step is rolled back first, then
//! every previously prepared step in reverse, and the original error is
//! returned. If all prepare, every step commits in order; a failing commit
//! unwinds all steps the same way. Rollback failures are logged and never
//! replace the original error or stop the unwind.

use std::fmt::Display;
use std::future::Future;

/// One resource taking part in a saga.
pub trait SagaStep {
    type Error: Display;

    fn name(&self) -> &'static str;

    fn prepare(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Undo whatever `prepare` (or a failed `commit`) left behind.
    fn rollback(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Run `steps` to completion or unwind them.
///
/// # Errors
///
/// The first `prepare` or `commit` error, after rollbacks were attempted.
pub async fn run<S: SagaStep + Send>(steps: &mut [S]) -> Result<(), S::Error> {
    for i in 0..steps.len() {
        let name = steps[i].name();
        tracing::info!(step = name, "saga: preparing");
        if let Err(err) = steps[i].prepare().await {
            tracing::info!(step = name, error = %err, "saga: prepare failed, unwinding");
            unwind(&mut steps[..=i]).await;
            return Err(err);
        }
        tracing::info!(step = name, "saga: prepared");
    }

    for i in 0..steps.len() {
        if let Err(err) = steps[i].commit().await {
            tracing::info!(step = steps[i].name(), error = %err, "saga: commit failed, unwinding");
            unwind(steps).await;
            return Err(err);
        }
    }
    tracing::info!(steps = steps.len(), "saga: committed");
    Ok(())
}

/// Roll back `steps` in reverse order.
async fn unwind<S: SagaStep + Send>(steps: &mut [S]) {
    for step in steps.iter_mut().rev() {
        let name = step.name();
        match step.rollback().await {
            Ok(()) => tracing::info!(step = name, "saga: rolled back"),
            Err(e) => tracing::warn!(step = name, error = %e, "saga: rollback failed"),
        }
    }
}
