use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Exponential backoff schedule used between retry attempts (spec §4.4
/// point 3): no delay before the first attempt, then 1s, then 5s, 25s for
/// any later attempt this schedule is asked to cover.
const BACKOFF: [Duration; 4] = [
    Duration::from_secs(0),
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(25),
];

const MAX_ATTEMPTS: usize = 3;

pub enum Outcome<T, E> {
    Completed(Result<T, E>),
    Cancelled,
}

/// Run `attempt` up to [`MAX_ATTEMPTS`] times, waiting the backoff delay
/// (cancellably) between tries. Returns as soon as an attempt succeeds, or
/// [`Outcome::Cancelled`] if the stop signal fires while waiting.
pub async fn run_with_backoff<T, E, F, Fut>(cancel: &CancellationToken, mut attempt: F) -> Outcome<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_err = None;

    for (index, delay) in BACKOFF.iter().enumerate().take(MAX_ATTEMPTS) {
        if index > 0 {
            tokio::select! {
                _ = tokio::time::sleep(*delay) => {}
                _ = cancel.cancelled() => return Outcome::Cancelled,
            }
        }

        tokio::select! {
            result = attempt(index) => {
                match result {
                    Ok(value) => return Outcome::Completed(Ok(value)),
                    Err(e) => last_err = Some(e),
                }
            }
            _ = cancel.cancelled() => return Outcome::Cancelled,
        }
    }

    Outcome::Completed(Err(last_err.expect("at least one attempt always runs")))
}
