use std::fmt;

use thiserror::Error;

/// Every provider failed; attempts are kept in evaluation order.
#[derive(Debug, Error)]
#[error("all {} providers failed", .attempts.len())]
pub struct FallbackError<E: fmt::Debug> {
    pub attempts: Vec<E>,
}

/// Evaluates providers in order and returns the first success.
pub fn try_in_order<T, E, I, F>(providers: I) -> Result<T, FallbackError<E>>
where
    E: fmt::Debug,
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Result<T, E>,
{
    let mut attempts = Vec::new();
    for provider in providers {
        match provider() {
            Ok(value) => return Ok(value),
            Err(error) => attempts.push(error),
        }
    }
    Err(FallbackError { attempts })
}
