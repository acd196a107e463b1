//! Fan-out/fan-in execution for multi-id operations.
//!
//! All per-id operations are started together and awaited as a set. Results are put back
//! into the caller's id order; completion order is irrelevant. The first failure aborts
//! the batch and the remaining operations are dropped.

use futures::{TryStreamExt, stream::FuturesUnordered};
use std::future::Future;

use crate::error::DocumentStoreResult;

/// Runs `op` for every id concurrently and returns the outputs in input order.
///
/// # Errors
///
/// Returns the first error any operation produces. No partial results are returned.
pub async fn fan_out<'a, T, F, Fut>(ids: &'a [String], op: F) -> DocumentStoreResult<Vec<T>>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = DocumentStoreResult<T>>,
{
    let mut pending = ids
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let operation = op(id.as_str());
            async move { operation.await.map(|output| (index, output)) }
        })
        .collect::<FuturesUnordered<_>>();

    let mut completed = Vec::with_capacity(ids.len());

    while let Some(entry) = pending.try_next().await? {
        completed.push(entry);
    }

    completed.sort_by_key(|(index, _)| *index);

    Ok(completed
        .into_iter()
        .map(|(_, output)| output)
        .collect())
}

/// Runs `op` for every id concurrently, discarding outputs.
///
/// # Errors
///
/// Returns the first error any operation produces.
pub async fn fan_out_unit<'a, F, Fut>(ids: &'a [String], op: F) -> DocumentStoreResult<()>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = DocumentStoreResult<()>>,
{
    fan_out(ids, op).await?;

    Ok(())
}
