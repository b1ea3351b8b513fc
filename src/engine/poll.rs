// ABOUTME: Reusable poll-until-condition execution shape for tasks
// ABOUTME: Evaluates immediately, then once per interval until success or cancellation

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::context::TaskContext;
use super::error::Result;

/// Evaluate `condition` until it returns `Ok(true)` or `ctx` is cancelled.
///
/// The first evaluation runs immediately. `Ok(false)` and `Err(_)` both mean
/// "not met yet"; only cancellation of the context ends the loop with an
/// error (timeout or cancellation, see [`TaskContext::interruption_error`]).
/// A pending evaluation is abandoned as soon as the context is cancelled.
pub async fn poll_until<F, Fut>(ctx: &TaskContext, interval: Duration, mut condition: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ctx.interruption_error()),
            outcome = condition() => outcome,
        };

        match outcome {
            Ok(true) => {
                debug!("Task {} condition met after {} attempt(s)", ctx.task_id(), attempt);
                return Ok(());
            }
            Ok(false) => {
                debug!("Task {} condition not met (attempt {})", ctx.task_id(), attempt);
            }
            Err(e) => {
                warn!(
                    "Task {} condition check failed (attempt {}): {:#}",
                    ctx.task_id(),
                    attempt,
                    e
                );
            }
        }

        ctx.sleep(interval).await?;
    }
}
