//! Output sinks and the session-controlled streaming sink.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::channel::mpsc;
use trickle_core::{CorrelationId, FlushPolicy, SinkError, TimingContext};

use crate::flush::FlushController;

/// Append-only byte sink with an optional flush.
pub trait OutputSink: Send {
    /// Append bytes.
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    /// Push buffered bytes to the client.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Whether `flush` does anything.
    fn supports_flush(&self) -> bool {
        false
    }
}

impl OutputSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        (**self).write(bytes)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn supports_flush(&self) -> bool {
        (**self).supports_flush()
    }
}

#[derive(Debug, Default)]
struct MemoryBuffer {
    bytes: Vec<u8>,
    /// Byte offsets at which a flush happened.
    flushed_at: Vec<usize>,
}

/// Shared in-memory sink that remembers flush boundaries.
///
/// Clones share one buffer, so a caller can keep a handle while the
/// session owns the sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<MemoryBuffer>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock().bytes).into_owned()
    }

    /// Output split at flush boundaries; trailing unflushed bytes form the last chunk.
    pub fn chunks(&self) -> Vec<String> {
        let buffer = self.lock();
        let mut chunks = Vec::new();
        let mut start = 0;
        for &end in &buffer.flushed_at {
            if end > start {
                chunks.push(String::from_utf8_lossy(&buffer.bytes[start..end]).into_owned());
                start = end;
            }
        }
        if start < buffer.bytes.len() {
            chunks.push(String::from_utf8_lossy(&buffer.bytes[start..]).into_owned());
        }
        chunks
    }

    /// Number of flush calls.
    pub fn flush_count(&self) -> usize {
        self.lock().flushed_at.len()
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.lock().bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let mut buffer = self.lock();
        let len = buffer.bytes.len();
        buffer.flushed_at.push(len);
        Ok(())
    }

    fn supports_flush(&self) -> bool {
        true
    }
}

/// Receiving half of a [`ChannelSink`]; a stream of flushed chunks.
pub type ChunkStream = mpsc::UnboundedReceiver<Vec<u8>>;

/// Sink that sends each flushed chunk over a channel.
///
/// The receiver is a `Stream<Item = Vec<u8>>` suitable as a streaming
/// response body.
#[derive(Debug)]
pub struct ChannelSink {
    buffer: Vec<u8>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelSink {
    /// Create a sink and the stream of its chunks.
    pub fn new() -> (Self, ChunkStream) {
        let (tx, rx) = mpsc::unbounded();
        (
            Self {
                buffer: Vec::new(),
                tx,
            },
            rx,
        )
    }
}

impl OutputSink for ChannelSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        if self.tx.is_closed() {
            return Err(SinkError::Closed);
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.buffer);
        self.tx
            .unbounded_send(chunk)
            .map_err(|_| SinkError::Closed)
    }

    fn supports_flush(&self) -> bool {
        true
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        let _ = self.flush();
        self.tx.close_channel();
    }
}

/// State of the streaming sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    /// Synchronous pass; inline output only.
    Inline,
    /// Activation script sent, patches can be streamed.
    Activated,
    /// Response has been completed.
    Completed,
}

/// Session-controlled sink enforcing the inline → activation → patches order.
pub struct StreamingSink {
    inner: Box<dyn OutputSink>,
    state: SinkState,
    flush: FlushController,
    timing: TimingContext,
    patches_sent: Vec<CorrelationId>,
}

impl StreamingSink {
    /// Create a new streaming sink.
    pub fn new(sink: impl OutputSink + 'static, policy: FlushPolicy) -> Self {
        Self {
            inner: Box::new(sink),
            state: SinkState::Inline,
            flush: FlushController::new(policy),
            timing: TimingContext::new(),
            patches_sent: Vec::new(),
        }
    }

    /// Write inline output.
    pub fn write_inline(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        if self.state == SinkState::Completed {
            return Err(SinkError::InvalidState("sink already completed"));
        }
        self.write_bytes(bytes)?;
        if self.flush.should_flush() {
            self.flush()?;
        }
        Ok(())
    }

    /// Send the activation script and flush. Allowed once.
    pub fn send_activation(&mut self, script: &str) -> Result<(), SinkError> {
        if self.state != SinkState::Inline {
            return Err(SinkError::InvalidState(
                "activation already sent or sink completed",
            ));
        }

        self.write_bytes(script.as_bytes())?;
        self.flush()?;
        self.timing.mark("activation_sent");
        self.state = SinkState::Activated;

        Ok(())
    }

    /// Send a resolved patch and flush. Activation must be sent first.
    pub fn send_patch(&mut self, cid: CorrelationId, html: &str) -> Result<(), SinkError> {
        match self.state {
            SinkState::Inline => return Err(SinkError::InvalidState("activation not sent")),
            SinkState::Completed => return Err(SinkError::InvalidState("sink already completed")),
            SinkState::Activated => {}
        }

        self.write_bytes(html.as_bytes())?;
        self.flush()?;
        self.timing.mark_patch_sent(cid);
        self.patches_sent.push(cid);

        Ok(())
    }

    /// Flush the underlying sink if it supports flushing.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        if self.inner.supports_flush() {
            self.inner.flush()?;
        }
        self.flush.reset();
        Ok(())
    }

    /// Complete the response with a final flush.
    pub fn complete(&mut self) -> Result<(), SinkError> {
        if self.state == SinkState::Completed {
            return Ok(());
        }
        let flushed = self.flush();
        self.state = SinkState::Completed;
        self.timing.mark("complete");
        flushed
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.inner.write(bytes)?;
        self.flush.add_bytes(bytes.len());
        Ok(())
    }

    /// Whether the activation script was sent.
    pub fn is_activated(&self) -> bool {
        self.state == SinkState::Activated
    }

    /// Correlation IDs of patches sent, in send order.
    pub fn patches_sent(&self) -> &[CorrelationId] {
        &self.patches_sent
    }

    /// Get timing context reference.
    pub fn timing(&self) -> &TimingContext {
        &self.timing
    }

    /// Get mutable timing context.
    pub fn timing_mut(&mut self) -> &mut TimingContext {
        &mut self.timing
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    // === MemorySink Tests ===

    #[test]
    fn test_memory_sink_chunks() {
        let mut sink = MemorySink::new();
        sink.write(b"<a>").unwrap();
        sink.flush().unwrap();
        sink.write(b"<b>").unwrap();
        sink.write(b"<c>").unwrap();
        sink.flush().unwrap();
        sink.flush().unwrap();
        sink.write(b"tail").unwrap();

        assert_eq!(sink.contents(), "<a><b><c>tail");
        assert_eq!(sink.chunks(), vec!["<a>", "<b><c>", "tail"]);
        assert_eq!(sink.flush_count(), 3);
    }

    #[test]
    fn test_memory_sink_clones_share_buffer() {
        let handle = MemorySink::new();
        let mut sink = handle.clone();
        sink.write(b"shared").unwrap();

        assert_eq!(handle.contents(), "shared");
    }

    // === ChannelSink Tests ===

    #[tokio::test]
    async fn test_channel_sink_sends_on_flush() {
        let (mut sink, mut stream) = ChannelSink::new();
        sink.write(b"one").unwrap();
        sink.write(b"two").unwrap();
        sink.flush().unwrap();
        sink.flush().unwrap();
        sink.write(b"three").unwrap();
        drop(sink);

        assert_eq!(stream.next().await, Some(b"onetwo".to_vec()));
        assert_eq!(stream.next().await, Some(b"three".to_vec()));
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn test_channel_sink_closed_receiver() {
        let (mut sink, stream) = ChannelSink::new();
        drop(stream);

        assert_eq!(sink.write(b"x"), Err(SinkError::Closed));
    }

    // === StreamingSink Tests ===

    #[test]
    fn test_patch_requires_activation() {
        let mut sink = StreamingSink::new(MemorySink::new(), FlushPolicy::AtMarkers);

        assert_eq!(
            sink.send_patch(1, "<template></template>"),
            Err(SinkError::InvalidState("activation not sent"))
        );
    }

    #[test]
    fn test_activation_once() {
        let mut sink = StreamingSink::new(MemorySink::new(), FlushPolicy::AtMarkers);
        sink.send_activation("<script></script>").unwrap();

        assert!(sink.is_activated());
        assert!(sink.send_activation("<script></script>").is_err());
        assert!(sink.timing().time_to_activation().is_some());
    }

    #[test]
    fn test_markers_flush() {
        let memory = MemorySink::new();
        let mut sink = StreamingSink::new(memory.clone(), FlushPolicy::AtMarkers);
        sink.write_inline(b"<p>inline</p>").unwrap();
        assert_eq!(memory.flush_count(), 0);

        sink.send_activation("<script></script>").unwrap();
        sink.send_patch(2, "<template>2</template>").unwrap();
        sink.send_patch(1, "<template>1</template>").unwrap();

        assert_eq!(memory.flush_count(), 3);
        assert_eq!(sink.patches_sent(), &[2, 1]);
        assert_eq!(
            memory.chunks(),
            vec![
                "<p>inline</p><script></script>",
                "<template>2</template>",
                "<template>1</template>",
            ]
        );
    }

    #[test]
    fn test_eager_policy_flushes_inline_writes() {
        let memory = MemorySink::new();
        let mut sink = StreamingSink::new(memory.clone(), FlushPolicy::Eager);
        sink.write_inline(b"a").unwrap();
        sink.write_inline(b"b").unwrap();

        assert_eq!(memory.chunks(), vec!["a", "b"]);
    }

    #[test]
    fn test_write_after_complete_rejected() {
        let mut sink = StreamingSink::new(Vec::new(), FlushPolicy::AtMarkers);
        sink.complete().unwrap();

        assert!(sink.write_inline(b"late").is_err());
        assert!(sink.timing().since_start("complete").is_some());
    }
}
