//! Memoized derived values.
//!
//! A [`Computed`] wraps a pure function of some source value and caches its
//! last result together with the source revision it was computed from. Reading
//! it at a newer revision recomputes; reading it again at the same revision
//! returns the cached value. Nothing ever has to invalidate it by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

type ComputeFn<S, T> = Box<dyn Fn(&S) -> T + Send + Sync>;

pub struct Computed<S, T> {
    name: &'static str,
    compute: ComputeFn<S, T>,
    cache: Mutex<Option<(u64, T)>>,
    evaluations: AtomicU64,
}

impl<S, T: Clone> Computed<S, T> {
    pub fn new(name: &'static str, compute: impl Fn(&S) -> T + Send + Sync + 'static) -> Self {
        Self {
            name,
            compute: Box::new(compute),
            cache: Mutex::new(None),
            evaluations: AtomicU64::new(0),
        }
    }

    /// Value for `source` as of `revision`, recomputing only if the cache was
    /// filled at a different revision.
    pub async fn get(&self, revision: u64, source: &S) -> T {
        let mut cache = self.cache.lock().await;
        if let Some((cached_revision, value)) = cache.as_ref()
            && *cached_revision == revision
        {
            return value.clone();
        }

        let value = (self.compute)(source);
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(computed = self.name, revision, "recomputed derived value");
        *cache = Some((revision, value.clone()));
        value
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// How many times the underlying function has run.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }
}
