//! Deferred slot scheduling and the await loop.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use trickle_core::{CorrelationId, RenderError, RenderEvent, RenderPhase};

use crate::frame::render_outcome;
use crate::session::RenderCx;
use crate::slot::{AsyncSlot, Outcome};

/// A resolved slot waiting to be patched in.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Correlation ID of the placeholder.
    pub cid: CorrelationId,
    /// Fragment that renders the content.
    pub fragment: String,
    /// Resolved data or error.
    pub outcome: Outcome,
}

/// Receiving half of the delivery queue.
pub type DeliveryQueue = mpsc::UnboundedReceiver<Delivery>;

/// Allocates correlation IDs and tracks outstanding deferred slots.
///
/// `outstanding` counts deliveries not yet consumed by the await loop,
/// including those whose background task has not sent yet. It is only
/// touched by the task that owns the session.
///
/// A slot deferred inside content that was later thrown away has no
/// placeholder in the output; it is orphaned and its delivery is consumed
/// without writing a patch.
#[derive(Debug)]
pub struct StreamScheduler {
    last_cid: CorrelationId,
    outstanding: usize,
    registered: usize,
    orphaned: HashSet<CorrelationId>,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl StreamScheduler {
    /// Create a scheduler and its delivery queue.
    pub fn new() -> (Self, DeliveryQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                last_cid: 0,
                outstanding: 0,
                registered: 0,
                orphaned: HashSet::new(),
                tx,
            },
            rx,
        )
    }

    /// Allocate the next correlation ID, starting at 1.
    pub fn next_cid(&mut self) -> CorrelationId {
        self.last_cid += 1;
        self.last_cid
    }

    /// Last correlation ID handed out, 0 before the first.
    pub fn last_cid(&self) -> CorrelationId {
        self.last_cid
    }

    /// Orphan every slot deferred after `since`.
    pub fn orphan_since(&mut self, since: CorrelationId) {
        self.orphaned.extend(since + 1..=self.last_cid);
    }

    /// Whether `cid` was orphaned; forgets it.
    pub fn take_orphan(&mut self, cid: CorrelationId) -> bool {
        self.orphaned.remove(&cid)
    }

    /// Defer a slot: allocate an ID and spawn a task that waits for the
    /// value and sends exactly one delivery.
    ///
    /// Must be called within a Tokio runtime.
    pub fn register(&mut self, fragment: &str, value: Arc<dyn AsyncSlot>) -> CorrelationId {
        let cid = self.next_cid();
        self.outstanding += 1;
        self.registered += 1;

        let tx = self.tx.clone();
        let fragment = fragment.to_string();
        tokio::spawn(async move {
            let outcome = value.outcome().await;
            // Fails only if the session was dropped mid-render.
            let _ = tx.send(Delivery {
                cid,
                fragment,
                outcome,
            });
        });

        cid
    }

    /// Record one consumed delivery.
    pub fn complete_one(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    /// Deliveries still expected.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Slots deferred so far.
    pub fn registered(&self) -> usize {
        self.registered
    }
}

/// State of the await loop. Leaving the loop is the done state.
#[derive(Debug)]
enum StreamState {
    /// Patching deliveries as they arrive.
    Awaiting,
    /// A fatal error occurred; deliveries are consumed and dropped.
    Draining(RenderError),
}

/// Patch in every deferred slot, in completion order.
///
/// Sends the activation script, then consumes deliveries until no work is
/// outstanding. Content rendered here may defer further slots, which extend
/// the loop. The first fatal error is returned after all deliveries drained.
pub(crate) async fn await_stream(
    cx: &mut RenderCx,
    queue: &mut DeliveryQueue,
) -> Result<(), RenderError> {
    let script = cx.markup.activation_script();
    cx.sink.send_activation(&script)?;
    cx.emit(RenderEvent::Phase(RenderPhase::Awaiting));

    let mut state = StreamState::Awaiting;
    loop {
        let outstanding = cx.outstanding();
        if outstanding == 0 {
            break;
        }
        let Some(delivery) = queue.recv().await else {
            return Err(RenderError::QueueClosed(outstanding));
        };

        let orphaned = cx
            .scheduler
            .as_mut()
            .is_some_and(|scheduler| scheduler.take_orphan(delivery.cid));

        state = match state {
            state if orphaned => {
                debug!(cid = delivery.cid, "discarding delivery for dropped placeholder");
                cx.emit(RenderEvent::DeliveryDiscarded { cid: delivery.cid });
                state
            }
            StreamState::Draining(err) => {
                debug!(cid = delivery.cid, "discarding delivery while draining");
                cx.emit(RenderEvent::DeliveryDiscarded { cid: delivery.cid });
                StreamState::Draining(err)
            }
            StreamState::Awaiting => match deliver(cx, &delivery) {
                Ok(()) => StreamState::Awaiting,
                Err(err) => {
                    warn!(cid = delivery.cid, fragment = %delivery.fragment, error = %err, "stream failed, draining");
                    cx.emit(RenderEvent::Phase(RenderPhase::Draining));
                    StreamState::Draining(err)
                }
            },
        };

        if let Some(scheduler) = cx.scheduler.as_mut() {
            scheduler.complete_one();
        }
    }

    match state {
        StreamState::Awaiting => Ok(()),
        StreamState::Draining(err) => Err(err),
    }
}

/// Render one delivery and send it as a patch.
fn deliver(cx: &mut RenderCx, delivery: &Delivery) -> Result<(), RenderError> {
    let html = match render_outcome(cx, &delivery.fragment, &delivery.outcome) {
        Ok(html) => html,
        Err(err) => {
            cx.sink.flush()?;
            return Err(err);
        }
    };

    let patch = cx.markup.resolved_patch(delivery.cid, &html);
    cx.sink.send_patch(delivery.cid, &patch)?;
    debug!(cid = delivery.cid, fragment = %delivery.fragment, "patch sent");
    cx.emit(RenderEvent::PatchSent {
        cid: delivery.cid,
        fragment: delivery.fragment.clone(),
        bytes: patch.len(),
    });

    Ok(())
}
