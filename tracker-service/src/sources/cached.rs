use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;

use crate::{
    pipeline::{Envelope, PipelineError, Source},
    sources::Table,
};

/// Time-bounded memoization in front of another source.
///
/// Within `ttl` of a successful fetch every caller gets the same immutable
/// table. Failures are never stored. The lock is held across the inner fetch,
/// so concurrent callers on a cold cache trigger a single download.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entry: Mutex<Option<Envelope<Arc<Table>>>>,
}

impl<S: Source> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Drop the cached table; the next fetch goes to the inner source.
    pub async fn invalidate(&self) {
        self.entry.lock().await.take();
    }
}

#[async_trait::async_trait]
impl<S: Source> Source for CachedSource<S> {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    async fn fetch(&self) -> Result<Envelope<Arc<Table>>, PipelineError> {
        let mut guard = self.entry.lock().await;

        if let Some(env) = guard.as_ref() {
            let fresh = env
                .received_at
                .elapsed()
                .map(|age| age < self.ttl)
                .unwrap_or(false);
            if fresh {
                metrics::counter!("tracker_source_cache_hits_total").increment(1);
                return Ok(env.clone());
            }
        }

        let env = self.inner.fetch().await?;
        *guard = Some(env.clone());
        Ok(env)
    }
}
