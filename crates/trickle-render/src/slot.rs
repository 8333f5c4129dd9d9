//! Type-erased access to pending slot values.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::warn;
use trickle_core::{Resolvable, SessionId};

/// Resolved slot content: the success payload or the error payload.
pub type Outcome = Result<Value, Value>;

/// A pending value that a slot can render.
///
/// Implemented for every [`Resolvable`] whose payloads serialize to JSON,
/// so fragments see the same `Value` data regardless of the producer's types.
#[async_trait]
pub trait AsyncSlot: Send + Sync {
    /// Session the value is bound to, if any.
    fn bound_session(&self) -> Option<SessionId>;

    /// The outcome, if already resolved.
    fn try_outcome(&self) -> Option<Outcome>;

    /// Wait for the outcome.
    async fn outcome(&self) -> Outcome;

    /// Block the current thread until the outcome is available.
    fn wait_outcome(&self) -> Outcome;
}

#[async_trait]
impl<T, E> AsyncSlot for Resolvable<T, E>
where
    T: Serialize + Send + Sync + 'static,
    E: Serialize + Send + Sync + 'static,
{
    fn bound_session(&self) -> Option<SessionId> {
        self.session()
    }

    fn try_outcome(&self) -> Option<Outcome> {
        self.try_get().map(to_outcome)
    }

    async fn outcome(&self) -> Outcome {
        to_outcome(self.get().await)
    }

    fn wait_outcome(&self) -> Outcome {
        to_outcome(block_in_place(|| self.wait()))
    }
}

/// Serialize a typed outcome.
///
/// A payload that cannot be serialized becomes an error outcome carrying the
/// serializer's message, so it renders through the `:error` variant.
pub fn to_outcome<T: Serialize, E: Serialize>(result: &Result<T, E>) -> Outcome {
    match result {
        Ok(value) => serde_json::to_value(value).map_err(|err| Value::String(err.to_string())),
        Err(error) => Err(serde_json::to_value(error).unwrap_or_else(|err| Value::String(err.to_string()))),
    }
}

/// Run a blocking closure without starving a multi-threaded runtime.
///
/// A current-thread runtime has no other worker to hand tasks to, so the
/// closure blocks it outright and only a producer on another thread can
/// resolve the value.
fn block_in_place<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        Ok(_) => {
            warn!("blocking the current-thread runtime on an unresolved slot; producers on this runtime cannot run");
            f()
        }
        Err(_) => f(),
    }
}
