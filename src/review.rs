//! Fan-out/join coordination for independent review tasks.
//!
//! The coordinator starts every task together, waits for all of them, and
//! returns a result per task name. There is no early exit: a failing task
//! surfaces as error text in its own slot while its siblings run to
//! completion, so the caller always gets the full mapping back. Completion
//! order is unspecified; task identity is preserved by key.

use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use tracing::{info, warn};

/// Run a set of named deferred computations concurrently and join them all.
///
/// Each task produces `Result<String, E>`; an `Err` (or a panicked task) is
/// converted to an error-text payload for its slot rather than aborting the
/// join.
pub async fn run_parallel<F, E>(tasks: HashMap<String, F>) -> HashMap<String, String>
where
    F: Future<Output = Result<String, E>> + Send + 'static,
    E: std::fmt::Display,
{
    info!(count = tasks.len(), "fanning out review tasks");

    let handles: Vec<(String, tokio::task::JoinHandle<Result<String, String>>)> = tasks
        .into_iter()
        .map(|(name, task)| {
            let handle = tokio::spawn(async move { task.await.map_err(|e| e.to_string()) });
            (name, handle)
        })
        .collect();

    let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
    let joined = join_all(handles).await;

    names
        .into_iter()
        .zip(joined)
        .map(|(name, outcome)| {
            let text = match outcome {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!(task = %name, error = %e, "review task failed");
                    format!("ERROR: review task '{name}' failed: {e}")
                }
                Err(join_err) => {
                    warn!(task = %name, error = %join_err, "review task panicked");
                    format!("ERROR: review task '{name}' aborted: {join_err}")
                }
            };
            (name, text)
        })
        .collect()
}
