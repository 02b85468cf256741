//! Observable store state and the busy/commit/fail lifecycle shared by every store operation
//!
//! A store keeps its whole state in a [`StateCell`]. Every mutation goes through
//! `send_modify` on a `watch` channel, so subscribers see each change without the
//! store knowing anything about the presentation layer.
//!
//! Operations bracket their network call with [`StateCell::begin`], which raises the
//! store's loading flag and returns a [`Busy`] guard. The flag is lowered when the
//! guard drops, after the operation has committed or recorded its failure.

use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::watch;

/// State that carries a store-wide loading flag
pub trait Lifecycle {
    fn set_loading(&mut self, loading: bool);
}

/// Shared, observable state container
pub struct StateCell<S> {
    tx: Arc<watch::Sender<S>>,
}

impl<S> Clone for StateCell<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: Clone> StateCell<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> S {
        self.tx.borrow().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }

    /// Mutate the state and notify all subscribers
    pub fn update(&self, f: impl FnOnce(&mut S)) {
        self.tx.send_modify(f);
    }
}

impl<S: Clone + Lifecycle> StateCell<S> {
    /// Start an operation: raise the loading flag and run `prepare` (typically
    /// clearing the operation's error slot) in the same notification.
    pub fn begin(&self, operation: &'static str, prepare: impl FnOnce(&mut S)) -> Busy<'_, S> {
        tracing::debug!(operation, "Store operation started");
        self.update(|state| {
            state.set_loading(true);
            prepare(state);
        });
        Busy {
            cell: self,
            operation,
        }
    }
}

/// Scoped loading flag for one in-flight operation
#[must_use = "dropping the guard immediately clears the loading flag"]
pub struct Busy<'a, S: Clone + Lifecycle> {
    cell: &'a StateCell<S>,
    operation: &'static str,
}

impl<S: Clone + Lifecycle> Busy<'_, S> {
    pub fn commit(&self, f: impl FnOnce(&mut S)) {
        self.cell.update(f);
    }

    /// Log the cause and record the failure in the state
    pub fn fail(&self, cause: &dyn Display, f: impl FnOnce(&mut S)) {
        tracing::warn!(operation = self.operation, error = %cause, "Store operation failed");
        self.cell.update(f);
    }
}

impl<S: Clone + Lifecycle> Drop for Busy<'_, S> {
    fn drop(&mut self) {
        self.cell.update(|state| state.set_loading(false));
        tracing::trace!(operation = self.operation, "Store operation finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default)]
    struct Sample {
        loading: bool,
        error: Option<String>,
        value: u32,
    }

    impl Lifecycle for Sample {
        fn set_loading(&mut self, loading: bool) {
            self.loading = loading;
        }
    }

    #[test]
    fn test_busy_guard_brackets_loading_flag() {
        let cell = StateCell::new(Sample {
            error: Some("stale".into()),
            ..Default::default()
        });

        {
            let busy = cell.begin("sample", |s| s.error = None);
            assert!(cell.read(|s| s.loading));
            assert!(cell.read(|s| s.error.is_none()));
            busy.commit(|s| s.value = 7);
            assert!(cell.read(|s| s.loading), "still loading until the guard drops");
        }

        let state = cell.snapshot();
        assert!(!state.loading);
        assert_eq!(state.value, 7);
    }

    #[test]
    fn test_fail_records_error_and_clears_loading() {
        let cell = StateCell::new(Sample::default());
        {
            let busy = cell.begin("sample", |_| {});
            busy.fail(&"boom", |s| s.error = Some("failed".into()));
        }
        let state = cell.snapshot();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("failed"));
    }

    #[test]
    fn test_nested_operations_share_the_flag() {
        let cell = StateCell::new(Sample::default());
        let outer = cell.begin("outer", |_| {});
        {
            let _inner = cell.begin("inner", |_| {});
        }
        assert!(!cell.read(|s| s.loading), "inner guard clears the shared flag");
        drop(outer);
        assert!(!cell.read(|s| s.loading));
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let cell = StateCell::new(Sample::default());
        let mut rx = cell.subscribe();

        let writer = cell.clone();
        tokio::spawn(async move {
            writer.update(|s| s.value = 42);
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().value, 42);
    }
}
