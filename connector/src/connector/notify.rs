//! Notification registry: keyed zero-argument callbacks fired on every
//! observable change.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

pub type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct Subscribers {
    callbacks: DashMap<String, Callback>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `key`, replacing any callback already
    /// registered there.
    pub fn subscribe<F>(&self, key: impl Into<String>, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.insert(key.into(), Arc::new(callback));
    }

    pub fn unsubscribe(&self, key: &str) -> bool {
        self.callbacks.remove(key).is_some()
    }

    /// Invoke every callback once, in no particular order. A panicking
    /// callback is logged and skipped. Returns how many ran cleanly.
    pub fn notify_all(&self) -> usize {
        // Snapshot first: callbacks may subscribe or unsubscribe.
        let snapshot: Vec<(String, Callback)> = self
            .callbacks
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (key, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback())) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(subscriber = %key, "subscriber panicked during notify"),
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(subs: &Subscribers, key: &str) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        subs.subscribe(key, move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        hits
    }

    #[test]
    fn fans_out_until_unsubscribed() {
        let subs = Subscribers::new();
        let a = counter(&subs, "a");
        let b = counter(&subs, "b");

        assert_eq!(subs.notify_all(), 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);

        assert!(subs.unsubscribe("a"));
        subs.notify_all();
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn same_key_replaces() {
        let subs = Subscribers::new();
        let old = counter(&subs, "header");
        let new = counter(&subs, "header");
        subs.notify_all();
        assert_eq!(subs.len(), 1);
        assert_eq!(old.load(Ordering::SeqCst), 0);
        assert_eq!(new.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_others() {
        let subs = Subscribers::new();
        subs.subscribe("bad", || panic!("render failed"));
        let good = counter(&subs, "good");

        assert_eq!(subs.notify_all(), 1);
        assert_eq!(good.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let subs = Arc::new(Subscribers::new());
        let inner = Arc::clone(&subs);
        subs.subscribe("once", move || {
            inner.unsubscribe("once");
        });
        subs.notify_all();
        assert!(subs.is_empty());
    }
}
