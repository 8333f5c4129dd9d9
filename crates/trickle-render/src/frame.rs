//! Rendering frames and the slot entry point.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use trickle_core::{RenderError, RenderEvent, SessionId};

use crate::compose::FragmentRef;
use crate::fragment::{ERROR_SUFFIX, PENDING_SUFFIX};
use crate::markup::escape_html;
use crate::scheduler::StreamScheduler;
use crate::session::RenderCx;
use crate::slot::{AsyncSlot, Outcome};

/// Where a frame's output goes.
enum Target {
    /// Straight into the session sink, in document order.
    Sink,
    /// Captured for wrapping (placeholders, patches, nested captures).
    Buffer(String),
}

/// Output position handed to a fragment while it renders.
///
/// A frame either writes into the session sink directly (the root pass) or
/// captures into a buffer. Slots are resolved through [`Frame::slot`] and
/// [`Frame::stream`].
pub struct Frame<'a> {
    cx: &'a mut RenderCx,
    target: Target,
}

impl<'a> Frame<'a> {
    pub(crate) fn root(cx: &'a mut RenderCx) -> Self {
        Self {
            cx,
            target: Target::Sink,
        }
    }

    pub(crate) fn buffered(cx: &'a mut RenderCx) -> Self {
        Self {
            cx,
            target: Target::Buffer(String::new()),
        }
    }

    fn into_buffer(self) -> String {
        match self.target {
            Target::Buffer(buffer) => buffer,
            Target::Sink => String::new(),
        }
    }

    /// Session this frame renders for.
    pub fn session_id(&self) -> SessionId {
        self.cx.id
    }

    /// Whether unresolved slots produce placeholders.
    pub fn is_streaming(&self) -> bool {
        self.cx.scheduler.is_some()
    }

    /// Write markup as is.
    pub fn write_raw(&mut self, html: &str) -> Result<(), RenderError> {
        match &mut self.target {
            Target::Sink => self.cx.sink.write_inline(html.as_bytes())?,
            Target::Buffer(buffer) => buffer.push_str(html),
        }
        Ok(())
    }

    /// Write HTML-escaped text.
    pub fn write_text(&mut self, text: &str) -> Result<(), RenderError> {
        self.write_raw(&escape_html(text))
    }

    /// Render a fragment at the current position.
    pub fn render(&mut self, name: &str, data: &Value) -> Result<(), RenderError> {
        let fragment = self
            .cx
            .fragments
            .get(name)
            .ok_or_else(|| RenderError::FragmentNotFound(name.to_string()))?;
        fragment.render(self, data)
    }

    /// Render a fragment reference at the current position.
    pub fn render_ref(&mut self, reference: &FragmentRef) -> Result<(), RenderError> {
        self.render(&reference.fragment, &reference.data)
    }

    /// Render a fragment into a string instead of the current position.
    pub fn capture(&mut self, name: &str, data: &Value) -> Result<String, RenderError> {
        capture(self.cx, name, data)
    }

    /// Render composed child content.
    ///
    /// A string is written as escaped text; a fragment reference (see
    /// [`FragmentRef::to_value`]) is rendered. Anything else is an error.
    pub fn render_child(&mut self, child: &Value) -> Result<(), RenderError> {
        if let Value::String(text) = child {
            return self.write_text(text);
        }
        match FragmentRef::from_value(child) {
            Some(reference) => self.render_ref(&reference),
            None => Err(RenderError::InvalidSlot(format!(
                "expected slotted content, got {}",
                value_kind(child)
            ))),
        }
    }

    /// Resolve a slot for the value bound to the session under `key`.
    pub fn stream(&mut self, fragment: &str, key: &str) -> Result<(), RenderError> {
        let value = self.cx.bindings.get(key).cloned().ok_or_else(|| {
            RenderError::InvalidSlot(format!("no value bound under '{}'", key))
        })?;
        self.resolve_slot(fragment, value)
    }

    /// Resolve a slot for a pending value.
    ///
    /// - Already resolved: the content renders inline.
    /// - Blocking session: flushes, waits for the value, renders inline.
    /// - Streaming session: renders `fragment:pending` inside a placeholder
    ///   and defers the content to a patch sent once the value resolves.
    ///
    /// Successful values render `fragment`; errors render `fragment:error`,
    /// and a missing or failing error variant renders nothing.
    pub fn slot<S>(&mut self, fragment: &str, value: &S) -> Result<(), RenderError>
    where
        S: AsyncSlot + Clone + 'static,
    {
        self.resolve_slot(fragment, Arc::new(value.clone()))
    }

    fn resolve_slot(
        &mut self,
        fragment: &str,
        value: Arc<dyn AsyncSlot>,
    ) -> Result<(), RenderError> {
        if let Some(bound) = value.bound_session() {
            if bound != self.cx.id {
                return Err(RenderError::InvalidSlot(format!(
                    "value for '{}' is bound to {}, not {}",
                    fragment, bound, self.cx.id
                )));
            }
        }

        if let Some(outcome) = value.try_outcome() {
            debug!(fragment, "slot resolved from cache");
            self.cx.emit(RenderEvent::SlotInline {
                fragment: fragment.to_string(),
            });
            let html = render_outcome(self.cx, fragment, &outcome)?;
            return self.write_raw(&html);
        }

        let Some(scheduler) = self.cx.scheduler.as_mut() else {
            self.cx.sink.flush()?;
            debug!(fragment, "blocking on unresolved slot");
            self.cx.emit(RenderEvent::SlotBlocked {
                fragment: fragment.to_string(),
            });
            let outcome = value.wait_outcome();
            let html = render_outcome(self.cx, fragment, &outcome)?;
            return self.write_raw(&html);
        };

        let cid = scheduler.register(fragment, value);
        debug!(fragment, cid, "slot deferred");
        self.cx.emit(RenderEvent::SlotDeferred {
            cid,
            fragment: fragment.to_string(),
        });
        let pending = render_optional(self.cx, &format!("{}{}", fragment, PENDING_SUFFIX), &Value::Null);
        let html = self.cx.markup.placeholder(cid, &pending);
        self.write_raw(&html)
    }
}

/// Render a fragment into a string.
pub(crate) fn capture(cx: &mut RenderCx, name: &str, data: &Value) -> Result<String, RenderError> {
    let mut frame = Frame::buffered(cx);
    frame.render(name, data)?;
    Ok(frame.into_buffer())
}

/// Render the content for a resolved slot.
///
/// Errors from the success path propagate; the error path never fails.
pub(crate) fn render_outcome(
    cx: &mut RenderCx,
    fragment: &str,
    outcome: &Outcome,
) -> Result<String, RenderError> {
    match outcome {
        Ok(data) => capture(cx, fragment, data),
        Err(payload) => Ok(render_optional(
            cx,
            &format!("{}{}", fragment, ERROR_SUFFIX),
            payload,
        )),
    }
}

/// Render an optional variant, replacing any failure with nothing.
///
/// Slots the variant deferred before failing are orphaned, since their
/// placeholders were dropped with the rest of its output.
pub(crate) fn render_optional(cx: &mut RenderCx, name: &str, data: &Value) -> String {
    let last_cid = cx.scheduler.as_ref().map(StreamScheduler::last_cid);
    match capture(cx, name, data) {
        Ok(html) => html,
        Err(err) => {
            if let (Some(scheduler), Some(since)) = (cx.scheduler.as_mut(), last_cid) {
                scheduler.orphan_since(since);
            }
            debug!(fragment = name, error = %err, "optional variant suppressed");
            cx.emit(RenderEvent::VariantSuppressed {
                fragment: name.to_string(),
                error: err.to_string(),
            });
            String::new()
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
