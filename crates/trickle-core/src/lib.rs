//! Core abstractions for trickle streaming renders.
//!
//! This crate provides the fundamental types and traits:
//! - `Resolvable` - Single-assignment future for slot data
//! - `RenderError` - Error taxonomy shared by the render crates
//! - `SessionId` - Per-render identity
//! - `TimingContext` / `RenderObserver` - Render lifecycle tracking
//! - `RenderConfig` - Render mode, flushing and markup settings

mod config;
mod context;
mod error;
mod future;
mod lifecycle;

pub use config::*;
pub use context::*;
pub use error::*;
pub use future::*;
pub use lifecycle::*;
