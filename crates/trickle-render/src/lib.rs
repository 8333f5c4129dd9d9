//! Streaming render sessions with out-of-order slot patches.
//!
//! This crate renders fragments incrementally:
//! - `RenderSession` - One render of a root fragment into a sink
//! - `Frame` - Output position and slot entry point for fragments
//! - `StreamScheduler` - Correlation IDs and deferred slot deliveries
//! - `Fragments` - Name to fragment registry
//! - `StreamingSink` / `OutputSink` - Flush-aware output
//! - `Markup` - Placeholder, patch and activation markup

mod compose;
mod flush;
mod fragment;
mod frame;
mod markup;
mod scheduler;
mod session;
mod sink;
mod slot;

pub use compose::*;
pub use flush::*;
pub use fragment::*;
pub use frame::Frame;
pub use markup::*;
pub use scheduler::{Delivery, DeliveryQueue, StreamScheduler};
pub use session::RenderSession;
pub use sink::*;
pub use slot::*;

// Re-export the core types fragments and callers touch most
pub use trickle_core::{
    CorrelationId, RenderConfig, RenderError, RenderMode, Resolvable, ResolveError, SessionId,
};
