//! Named fragments and the registry that renders them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use trickle_core::RenderError;

use crate::frame::Frame;

/// Suffix of the variant rendered while a slot is pending.
pub const PENDING_SUFFIX: &str = ":pending";

/// Suffix of the variant rendered when a slot resolves with an error.
pub const ERROR_SUFFIX: &str = ":error";

/// A named, independently renderable unit of content.
///
/// Fragments render synchronously into a [`Frame`]. Slots backed by
/// pending values are handed to the frame, which decides whether to wait,
/// render from cache, or emit a placeholder.
pub trait Fragment: Send + Sync {
    /// Render with the given data.
    fn render(&self, frame: &mut Frame<'_>, data: &Value) -> Result<(), RenderError>;
}

impl<F> Fragment for F
where
    F: Fn(&mut Frame<'_>, &Value) -> Result<(), RenderError> + Send + Sync,
{
    fn render(&self, frame: &mut Frame<'_>, data: &Value) -> Result<(), RenderError> {
        self(frame, data)
    }
}

/// Registry mapping fragment names to fragments.
///
/// By convention a fragment `name` may have two optional companions:
/// `name:pending`, rendered with `null` while its value is outstanding, and
/// `name:error`, rendered with the error payload when the value fails.
#[derive(Clone, Default)]
pub struct Fragments {
    fragments: HashMap<String, Arc<dyn Fragment>>,
}

impl Fragments {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure fragment.
    pub fn insert<F>(&mut self, name: impl Into<String>, fragment: F) -> &mut Self
    where
        F: Fn(&mut Frame<'_>, &Value) -> Result<(), RenderError> + Send + Sync + 'static,
    {
        self.insert_fragment(name, Arc::new(fragment))
    }

    /// Register a shared fragment.
    pub fn insert_fragment(
        &mut self,
        name: impl Into<String>,
        fragment: Arc<dyn Fragment>,
    ) -> &mut Self {
        self.fragments.insert(name.into(), fragment);
        self
    }

    /// Register a closure fragment, builder style.
    pub fn with<F>(mut self, name: impl Into<String>, fragment: F) -> Self
    where
        F: Fn(&mut Frame<'_>, &Value) -> Result<(), RenderError> + Send + Sync + 'static,
    {
        self.insert(name, fragment);
        self
    }

    /// Register a static piece of markup.
    pub fn with_static(self, name: impl Into<String>, html: impl Into<String>) -> Self {
        let html = html.into();
        self.with(name, move |frame: &mut Frame<'_>, _: &Value| frame.write_raw(&html))
    }

    /// Look up a fragment.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Fragment>> {
        self.fragments.get(name).cloned()
    }

    /// Check whether a fragment is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fragments.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

impl fmt::Debug for Fragments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragments")
            .field("names", &self.names())
            .finish()
    }
}
