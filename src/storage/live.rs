//! Live queries: standing queries that push full result snapshots.
//!
//! A subscription re-runs its query after every committed change and hands the
//! callback the complete current result whenever it differs from the last one
//! delivered. Callers never see deltas.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::db::{Database, DatabaseError};
use super::query::LiveQuery;

/// Handle to a running live query. Dropping it cancels the subscription.
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Database {
    /// Start a live query. `on_snapshot` receives the initial result and every
    /// changed result after that; `on_error` receives query failures. Errors are
    /// not retried: the subscription keeps listening and delivers again after the
    /// next committed change.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<Q, S, E>(&self, query: Q, mut on_snapshot: S, mut on_error: E) -> Subscription
    where
        Q: LiveQuery,
        S: FnMut(Vec<Q::Item>) + Send + 'static,
        E: FnMut(DatabaseError) + Send + 'static,
    {
        let db = self.clone();
        // Subscribe before the first read so no commit slips between them.
        let mut changes = self.changes();

        let task = tokio::spawn(async move {
            let mut last: Option<Vec<Q::Item>> = None;

            loop {
                match query.run(&db) {
                    Ok(snapshot) => {
                        if last.as_ref() != Some(&snapshot) {
                            last = Some(snapshot.clone());
                            on_snapshot(snapshot);
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Live query failed");
                        last = None;
                        on_error(e);
                    }
                }

                match changes.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Live query lagged behind change feed");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Subscription { task }
    }
}
