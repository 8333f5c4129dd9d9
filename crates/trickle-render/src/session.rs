//! Render sessions.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use trickle_core::{
    RenderConfig, RenderError, RenderEvent, RenderObserver, RenderPhase, Resolvable, SessionId,
    TimingContext,
};

use crate::compose::FragmentRef;
use crate::fragment::Fragments;
use crate::frame::Frame;
use crate::markup::Markup;
use crate::scheduler::{await_stream, DeliveryQueue, StreamScheduler};
use crate::sink::{OutputSink, StreamingSink};
use crate::slot::AsyncSlot;

/// State of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Created, not rendered yet.
    Ready,
    /// Render in progress.
    Rendering,
    /// Render returned.
    Finished,
}

/// Everything a frame needs while rendering.
pub(crate) struct RenderCx {
    pub(crate) id: SessionId,
    pub(crate) fragments: Arc<Fragments>,
    pub(crate) sink: StreamingSink,
    pub(crate) scheduler: Option<StreamScheduler>,
    pub(crate) bindings: HashMap<String, Arc<dyn AsyncSlot>>,
    pub(crate) markup: Markup,
    pub(crate) observer: Option<Arc<dyn RenderObserver>>,
}

impl RenderCx {
    pub(crate) fn emit(&self, event: RenderEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event, self.sink.timing().elapsed());
        }
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.scheduler.as_ref().map_or(0, StreamScheduler::outstanding)
    }
}

/// One render of one root fragment into one sink.
///
/// A streaming session writes the root fragment inline, with placeholders
/// for unresolved slots, then patches each placeholder as its value
/// resolves. A blocking session waits on unresolved slots inline and never
/// emits placeholders or the activation script.
///
/// # Example
///
/// ```rust,ignore
/// let mut session = RenderSession::new(fragments, sink, &RenderConfig::streaming());
/// let profile = session.resolvable::<Profile, String>();
/// session.bind("profile", profile.clone());
/// tokio::spawn(load_profile(profile));
/// session.render("page", &json!({})).await?;
/// ```
pub struct RenderSession {
    state: SessionState,
    attached: Option<String>,
    cx: RenderCx,
    queue: Option<DeliveryQueue>,
}

impl RenderSession {
    /// Create a session.
    pub fn new(
        fragments: Arc<Fragments>,
        sink: impl OutputSink + 'static,
        config: &RenderConfig,
    ) -> Self {
        let (scheduler, queue) = if config.is_streaming() {
            let (scheduler, queue) = StreamScheduler::new();
            (Some(scheduler), Some(queue))
        } else {
            (None, None)
        };

        Self {
            state: SessionState::Ready,
            attached: None,
            cx: RenderCx {
                id: SessionId::generate(),
                fragments,
                sink: StreamingSink::new(sink, config.flush),
                scheduler,
                bindings: HashMap::new(),
                markup: Markup::new(config.markup.clone()),
                observer: None,
            },
            queue,
        }
    }

    /// Create a streaming session with default settings.
    pub fn streaming(fragments: Arc<Fragments>, sink: impl OutputSink + 'static) -> Self {
        Self::new(fragments, sink, &RenderConfig::streaming())
    }

    /// Create a blocking session with default settings.
    pub fn blocking(fragments: Arc<Fragments>, sink: impl OutputSink + 'static) -> Self {
        Self::new(fragments, sink, &RenderConfig::blocking())
    }

    /// Attach an observer for render events.
    pub fn with_observer(mut self, observer: Arc<dyn RenderObserver>) -> Self {
        self.cx.observer = Some(observer);
        self
    }

    /// Get the session ID.
    pub fn id(&self) -> SessionId {
        self.cx.id
    }

    /// Whether unresolved slots are streamed.
    pub fn is_streaming(&self) -> bool {
        self.cx.scheduler.is_some()
    }

    /// Root fragment of the render, once started.
    pub fn attached(&self) -> Option<&str> {
        self.attached.as_deref()
    }

    /// Create a pending value bound to this session.
    pub fn resolvable<T, E>(&self) -> Resolvable<T, E> {
        Resolvable::bound(self.cx.id)
    }

    /// Make a pending value available to fragments under `key`.
    pub fn bind(&mut self, key: impl Into<String>, value: impl AsyncSlot + 'static) -> &mut Self {
        self.cx.bindings.insert(key.into(), Arc::new(value));
        self
    }

    /// Bind a pending value, builder style.
    pub fn with_binding(mut self, key: impl Into<String>, value: impl AsyncSlot + 'static) -> Self {
        self.bind(key, value);
        self
    }

    /// Deferred slots not yet patched.
    pub fn outstanding(&self) -> usize {
        self.cx.outstanding()
    }

    /// Slots deferred during the render.
    pub fn deferred(&self) -> usize {
        self.cx
            .scheduler
            .as_ref()
            .map_or(0, StreamScheduler::registered)
    }

    /// Get timing context reference.
    pub fn timing(&self) -> &TimingContext {
        self.cx.sink.timing()
    }

    /// Render a fragment reference.
    pub async fn render_ref(&mut self, root: &FragmentRef) -> Result<(), RenderError> {
        self.render(&root.fragment, &root.data).await
    }

    /// Render the root fragment, then, when streaming, patch every deferred
    /// slot before returning.
    ///
    /// A failure in the synchronous pass returns immediately. A failure
    /// rendering resolved content is returned once all outstanding
    /// deliveries are drained. A session renders once.
    pub async fn render(&mut self, root: &str, data: &Value) -> Result<(), RenderError> {
        if self.state != SessionState::Ready {
            return Err(RenderError::SessionReused);
        }
        self.state = SessionState::Rendering;
        self.attached = Some(root.to_string());
        self.cx.emit(RenderEvent::Phase(RenderPhase::Start));

        let result = self.run(root, data).await;
        let completed = self.cx.sink.complete();
        self.state = SessionState::Finished;

        let result = result.and(completed.map_err(RenderError::from));
        match &result {
            Ok(()) => {
                info!(
                    session = %self.cx.id,
                    root,
                    deferred = self.deferred(),
                    elapsed_us = self.timing().total_time().as_micros() as u64,
                    "render complete"
                );
                self.cx.emit(RenderEvent::Phase(RenderPhase::Completion));
            }
            Err(err) => {
                warn!(session = %self.cx.id, root, error = %err, "render failed");
                self.cx
                    .emit(RenderEvent::Phase(RenderPhase::Error(err.to_string())));
            }
        }
        result
    }

    async fn run(&mut self, root: &str, data: &Value) -> Result<(), RenderError> {
        Frame::root(&mut self.cx).render(root, data)?;
        self.cx.sink.timing_mut().mark("inline_complete");
        self.cx.emit(RenderEvent::Phase(RenderPhase::InlineComplete));

        let Some(mut queue) = self.queue.take() else {
            return Ok(());
        };
        await_stream(&mut self.cx, &mut queue).await
    }
}
