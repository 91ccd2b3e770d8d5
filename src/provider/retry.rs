//! Shared retry loop for provider calls.
//!
//! Every backend drives its HTTP attempts through [`run_with_retry`]: a
//! timeout race around each attempt, exponential backoff for retryable
//! failures, and a hard attempt budget. Vendor-specific failure vocabulary is
//! classified into [`AttemptError`] by each backend before the loop sees it,
//! so the loop itself is identical across providers.

use crate::error::{GenError, Result};
use colored::Colorize;
use futures::future::LocalBoxFuture;
use std::time::Duration;
use tokio::time::{sleep, timeout};

pub const TIMEOUT_MS: u64 = 30_000;
pub const MAX_RETRIES: u32 = 3;

/// Per-attempt failure, already classified by the provider's own rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    RateLimited(String),
    Auth(String),
    NotFound(String),
    Blocked(String),
    Empty(String),
    Other(String),
}

pub type AttemptFuture<'a> = LocalBoxFuture<'a, std::result::Result<String, AttemptError>>;

/// Drive one logical call: race each attempt against the timeout, back off
/// and retry on timeout (`2^attempt` s) and rate limiting (`2^attempt + 1` s),
/// fail fast on everything else. `on_not_found` is the Vertex region-fallback
/// hook; it returns whether a fallback was applied. The fallback retries
/// immediately but consumes an attempt slot like any other retry.
///
/// When the timer wins the race the losing attempt future is dropped. The
/// underlying network call is not guaranteed to be cancelled at that point;
/// for a process that exits right after the call this leak is acceptable.
pub async fn run_with_retry<'a, F, H>(
    verbose: bool,
    mut attempt_fn: F,
    mut on_not_found: H,
) -> Result<String>
where
    F: FnMut() -> AttemptFuture<'a>,
    H: FnMut() -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        if attempt >= MAX_RETRIES {
            return Err(GenError::MaxRetriesExceeded);
        }
        if verbose && attempt > 0 {
            eprintln!(
                "{}",
                format!("[askcmd] attempt {}/{}", attempt + 1, MAX_RETRIES).dimmed()
            );
        }
        match timeout(Duration::from_millis(TIMEOUT_MS), attempt_fn()).await {
            Err(_) => {
                if attempt == MAX_RETRIES - 1 {
                    return Err(GenError::Timeout);
                }
                sleep(Duration::from_secs(1u64 << attempt)).await;
                attempt += 1;
            }
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(AttemptError::RateLimited(msg))) => {
                if attempt == MAX_RETRIES - 1 {
                    return Err(GenError::RateLimited(msg));
                }
                sleep(Duration::from_secs((1u64 << attempt) + 1)).await;
                attempt += 1;
            }
            Ok(Err(AttemptError::Auth(msg))) => return Err(GenError::AuthFailure(msg)),
            Ok(Err(AttemptError::NotFound(msg))) => {
                // The fallback needs a slot of its own to run in.
                if attempt + 1 < MAX_RETRIES && on_not_found() {
                    attempt += 1;
                } else {
                    return Err(GenError::NotFound(msg));
                }
            }
            Ok(Err(AttemptError::Blocked(msg))) => return Err(GenError::ContentBlocked(msg)),
            Ok(Err(AttemptError::Empty(msg))) => return Err(GenError::ContentEmpty(msg)),
            Ok(Err(AttemptError::Other(msg))) => return Err(GenError::Unknown(msg)),
        }
    }
}
