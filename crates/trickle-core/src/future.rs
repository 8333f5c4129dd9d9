//! Single-assignment future for slot data.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;

use crate::context::SessionId;
use crate::error::ResolveError;

/// Data or error that becomes available later.
///
/// A `Resolvable` is resolved exactly once, with either [`resolve_ok`] or
/// [`resolve_err`], usually from a task running concurrently with the render.
/// Every handle cloned from the same value observes the same outcome, and
/// reads after resolution return the cached outcome without waiting.
///
/// A value that is never resolved keeps any render waiting on it suspended
/// forever; resolving it is the producer's obligation.
///
/// [`resolve_ok`]: Resolvable::resolve_ok
/// [`resolve_err`]: Resolvable::resolve_err
pub struct Resolvable<T, E> {
    shared: Arc<Shared<T, E>>,
}

struct Shared<T, E> {
    outcome: OnceLock<Result<T, E>>,
    resolved: Notify,
    session: Option<SessionId>,
}

impl<T, E> Resolvable<T, E> {
    /// Create a pending value usable with any render session.
    pub fn new() -> Self {
        Self::with_session(None)
    }

    /// Create a pending value bound to one render session.
    pub fn bound(session: SessionId) -> Self {
        Self::with_session(Some(session))
    }

    fn with_session(session: Option<SessionId>) -> Self {
        Self {
            shared: Arc::new(Shared {
                outcome: OnceLock::new(),
                resolved: Notify::new(),
                session,
            }),
        }
    }

    /// Session this value is bound to, if any.
    pub fn session(&self) -> Option<SessionId> {
        self.shared.session
    }

    /// Resolve with data.
    pub fn resolve_ok(&self, value: T) -> Result<(), ResolveError> {
        self.resolve(Ok(value))
    }

    /// Resolve with an error.
    pub fn resolve_err(&self, error: E) -> Result<(), ResolveError> {
        self.resolve(Err(error))
    }

    fn resolve(&self, outcome: Result<T, E>) -> Result<(), ResolveError> {
        self.shared
            .outcome
            .set(outcome)
            .map_err(|_| ResolveError::AlreadyResolved)?;
        self.shared.resolved.notify_waiters();
        Ok(())
    }

    /// Whether an outcome has been written.
    pub fn is_resolved(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// Get the outcome without waiting.
    pub fn try_get(&self) -> Option<&Result<T, E>> {
        self.shared.outcome.get()
    }

    /// Wait for the outcome.
    pub async fn get(&self) -> &Result<T, E> {
        loop {
            // Register before checking so a resolve in between still wakes us.
            let notified = self.shared.resolved.notified();
            if let Some(outcome) = self.shared.outcome.get() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Block the current thread until the outcome is available.
    ///
    /// Must not be called from a single-threaded async runtime that also
    /// drives the producer, nor from inside a `futures` executor.
    pub fn wait(&self) -> &Result<T, E> {
        match self.try_get() {
            Some(outcome) => outcome,
            None => futures::executor::block_on(self.get()),
        }
    }
}

impl<T, E> Clone for Resolvable<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Default for Resolvable<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Resolvable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolvable")
            .field("resolved", &self.is_resolved())
            .field("session", &self.shared.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    // === Resolution Tests ===

    #[test]
    fn test_new_is_pending() {
        let value: Resolvable<i32, String> = Resolvable::new();

        assert!(!value.is_resolved());
        assert!(value.try_get().is_none());
        assert!(value.session().is_none());
    }

    #[test]
    fn test_resolve_ok() {
        let value: Resolvable<i32, String> = Resolvable::new();
        value.resolve_ok(42).unwrap();

        assert!(value.is_resolved());
        assert_eq!(value.try_get(), Some(&Ok(42)));
    }

    #[test]
    fn test_resolve_err() {
        let value: Resolvable<i32, String> = Resolvable::new();
        value.resolve_err("boom".to_string()).unwrap();

        assert_eq!(value.try_get(), Some(&Err("boom".to_string())));
    }

    #[test]
    fn test_second_resolution_rejected() {
        let value: Resolvable<i32, String> = Resolvable::new();
        value.resolve_ok(1).unwrap();

        assert_eq!(value.resolve_ok(2), Err(ResolveError::AlreadyResolved));
        assert_eq!(
            value.resolve_err("late".to_string()),
            Err(ResolveError::AlreadyResolved)
        );
        assert_eq!(value.try_get(), Some(&Ok(1)));
    }

    #[test]
    fn test_clones_share_outcome() {
        let value: Resolvable<&str, ()> = Resolvable::new();
        let producer = value.clone();
        producer.resolve_ok("shared").unwrap();

        assert_eq!(value.try_get(), Some(&Ok("shared")));
    }

    #[test]
    fn test_bound_session() {
        let session = SessionId(99);
        let value: Resolvable<(), ()> = Resolvable::bound(session);

        assert_eq!(value.session(), Some(session));
    }

    // === Waiting Tests ===

    #[tokio::test]
    async fn test_get_waits_for_producer() {
        let value: Resolvable<u8, ()> = Resolvable::new();
        let producer = value.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.resolve_ok(7).unwrap();
        });

        assert_eq!(value.get().await, &Ok(7));
    }

    #[tokio::test]
    async fn test_get_is_idempotent() {
        let value: Resolvable<String, ()> = Resolvable::new();
        value.resolve_ok("cached".to_string()).unwrap();

        let first = value.get().await;
        let second = value.get().await;

        assert!(std::ptr::eq(first, second));
        assert_eq!(first, &Ok("cached".to_string()));
    }

    #[tokio::test]
    async fn test_many_waiters_see_same_outcome() {
        let value: Resolvable<u32, ()> = Resolvable::new();
        let mut waiters = Vec::new();
        for _ in 0..8 {
            let reader = value.clone();
            waiters.push(tokio::spawn(async move { reader.get().await.clone() }));
        }

        value.resolve_ok(5).unwrap();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Ok(5));
        }
    }

    #[test]
    fn test_wait_blocks_until_resolved() {
        let value: Resolvable<i64, ()> = Resolvable::new();
        let producer = value.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.resolve_ok(-1).unwrap();
        });

        assert_eq!(value.wait(), &Ok(-1));
        handle.join().unwrap();
    }
}
