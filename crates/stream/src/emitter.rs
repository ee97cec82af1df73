//! The outbound handle of a stream.
//!
//! [`StreamEmitter`] is the only way payload reaches the transport once filter
//! processing produced it. It owns the stream's [`StreamState`] and checks every
//! operation against it before any transport I/O happens, so illegal calls fail
//! locally with [`StreamError::IllegalState`].
//!
//! State changes are single compare-and-swap steps, which makes [`StreamEmitter::cancel`]
//! safe to race against sends issued from other threads: once a cancel won, every
//! later send fails fast without touching the transport.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::ensure;
use crate::protocol::{AtomicStreamState, HeaderMap, StreamError, StreamId, StreamState, TransportError};
use crate::transport::Transport;

/// A clonable handle pushing headers, data, metadata and trailers into one stream.
///
/// Every operation returns the emitter itself so calls can be chained:
///
/// ```
/// use bytes::Bytes;
/// use micro_stream::emitter::StreamEmitter;
/// use micro_stream::protocol::{HeaderMap, StreamId, StreamState};
/// use micro_stream::transport;
///
/// let (transport, _events) = transport::channel();
/// let emitter = StreamEmitter::new(StreamId::new(1), transport);
///
/// emitter
///     .send_headers(&HeaderMap::builder().add(":method", "POST").build(), false)?
///     .send_data(Bytes::from_static(b"hello"), false)?
///     .close(None)?;
///
/// assert_eq!(emitter.state(), StreamState::HalfClosed);
/// # Ok::<(), micro_stream::protocol::StreamError>(())
/// ```
#[derive(Debug)]
pub struct StreamEmitter<T> {
    inner: Arc<EmitterInner<T>>,
}

#[derive(Debug)]
struct EmitterInner<T> {
    id: StreamId,
    state: AtomicStreamState,
    transport: T,
}

impl<T> Clone for StreamEmitter<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Transport> StreamEmitter<T> {
    pub fn new(id: StreamId, transport: T) -> Self {
        Self { inner: Arc::new(EmitterInner { id, state: AtomicStreamState::new(StreamState::Idle), transport }) }
    }

    #[inline]
    pub fn id(&self) -> StreamId {
        self.inner.id
    }

    #[inline]
    pub fn state(&self) -> StreamState {
        self.inner.state.load()
    }

    /// Returns true if headers were sent and the stream has not been ended or cancelled.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Opens the stream with its header block.
    ///
    /// Only legal while the stream is idle; `end_stream` half-closes it right away.
    pub fn send_headers(&self, headers: &HeaderMap, end_stream: bool) -> Result<&Self, StreamError> {
        let next = if end_stream { StreamState::HalfClosed } else { StreamState::HeadersSent };
        self.advance("send headers", |state| (state == StreamState::Idle).then_some(next))?;

        debug!(stream = %self.id(), end_stream, headers = headers.len(), "send headers");
        self.settle(self.inner.transport.send_headers(headers, end_stream))
    }

    /// Sends a chunk of body data; `end_stream` marks it as the final frame with no trailers.
    pub fn send_data(&self, data: Bytes, end_stream: bool) -> Result<&Self, StreamError> {
        let next = if end_stream { StreamState::HalfClosed } else { StreamState::DataSent };
        self.advance("send data", |state| state.is_active().then_some(next))?;

        debug!(stream = %self.id(), end_stream, length = data.len(), "send data");
        self.settle(self.inner.transport.send_data(data, end_stream))
    }

    /// Sends in-stream metadata; the stream state does not change.
    pub fn send_metadata(&self, metadata: &HeaderMap) -> Result<&Self, StreamError> {
        let state = self.state();
        ensure!(state.is_active(), StreamError::illegal_state(format!("can not send metadata while stream is {state}")));

        debug!(stream = %self.id(), metadata = metadata.len(), "send metadata");
        self.settle(self.inner.transport.send_metadata(metadata))
    }

    /// Ends the local side of the stream.
    ///
    /// With trailers, the trailer frame ends the stream. Without, a zero-length data
    /// frame with `end_stream` set is sent instead.
    pub fn close(&self, trailers: Option<&HeaderMap>) -> Result<&Self, StreamError> {
        self.advance("close", |state| state.is_active().then_some(StreamState::HalfClosed))?;

        let result = match trailers {
            Some(trailers) => {
                debug!(stream = %self.id(), trailers = trailers.len(), "close with trailers");
                self.inner.transport.send_trailers(trailers)
            }
            None => {
                debug!(stream = %self.id(), "close with empty data frame");
                self.inner.transport.send_data(Bytes::new(), true)
            }
        };
        self.settle(result)
    }

    /// Abruptly terminates the stream, whatever phase it is in.
    pub fn cancel(&self) -> Result<&Self, StreamError> {
        self.advance("cancel", |state| (!state.is_terminal()).then_some(StreamState::Cancelled))?;

        debug!(stream = %self.id(), "cancel stream");
        self.settle(self.inner.transport.cancel())
    }

    /// Cancels the stream on behalf of the pipeline, also after the local side closed.
    ///
    /// Returns false if the stream was already closed or cancelled. A transport
    /// failure is logged, the stream is cancelled either way.
    pub fn reset(&self) -> bool {
        let reset = self
            .inner
            .state
            .transition(|state| (!matches!(state, StreamState::Closed | StreamState::Cancelled)).then_some(StreamState::Cancelled))
            .is_ok();

        if reset {
            debug!(stream = %self.id(), "reset stream");
            if let Err(e) = self.inner.transport.cancel() {
                warn!(stream = %self.id(), cause = %e, "transport failed to cancel");
            }
        }
        reset
    }

    /// Records that the transport finished the stream.
    ///
    /// Returns false if the stream was already closed or cancelled.
    pub fn mark_closed(&self) -> bool {
        self.inner
            .state
            .transition(|state| (!matches!(state, StreamState::Closed | StreamState::Cancelled)).then_some(StreamState::Closed))
            .is_ok()
    }

    fn advance<F>(&self, operation: &'static str, next: F) -> Result<StreamState, StreamError>
    where
        F: FnMut(StreamState) -> Option<StreamState>,
    {
        self.inner
            .state
            .transition(next)
            .map_err(|state| StreamError::illegal_state(format!("can not {operation} while stream is {state}")))
    }

    fn settle(&self, result: Result<(), TransportError>) -> Result<&Self, StreamError> {
        match result {
            Ok(()) => Ok(self),
            Err(e) => {
                warn!(stream = %self.id(), cause = %e, "transport failed, stream is closed");
                self.mark_closed();
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use mockall::predicate::eq;

    fn headers() -> HeaderMap {
        HeaderMap::builder().add(":method", "GET").add(":path", "/").build()
    }

    fn open_emitter(mut transport: MockTransport) -> StreamEmitter<MockTransport> {
        transport.expect_send_headers().times(1).returning(|_, _| Ok(()));
        let emitter = StreamEmitter::new(StreamId::new(7), transport);
        emitter.send_headers(&headers(), false).unwrap();
        emitter
    }

    #[test]
    fn close_without_trailers_sends_one_empty_end_stream_frame() {
        let mut transport = MockTransport::new();
        transport.expect_send_data().with(eq(Bytes::new()), eq(true)).times(1).returning(|_, _| Ok(()));
        transport.expect_send_trailers().never();

        let emitter = open_emitter(transport);
        emitter.close(None).unwrap();

        assert_eq!(emitter.state(), StreamState::HalfClosed);
    }

    #[test]
    fn close_with_trailers_sends_only_trailers() {
        let trailers = HeaderMap::builder().add("a", "b").build();

        let mut transport = MockTransport::new();
        transport.expect_send_trailers().with(eq(trailers.clone())).times(1).returning(|_| Ok(()));
        transport.expect_send_data().never();

        let emitter = open_emitter(transport);
        emitter.close(Some(&trailers)).unwrap();
    }

    #[test]
    fn every_operation_after_a_terminal_call_is_illegal() {
        let mut transport = MockTransport::new();
        transport.expect_cancel().times(1).returning(|| Ok(()));
        transport.expect_send_data().never();
        transport.expect_send_metadata().never();
        transport.expect_send_trailers().never();

        let emitter = open_emitter(transport);
        emitter.cancel().unwrap();

        assert!(emitter.send_data(Bytes::from_static(b"late"), false).unwrap_err().is_illegal_state());
        assert!(emitter.send_metadata(&headers()).unwrap_err().is_illegal_state());
        assert!(emitter.close(None).unwrap_err().is_illegal_state());
        assert!(emitter.cancel().unwrap_err().is_illegal_state());
        assert_eq!(emitter.state(), StreamState::Cancelled);
    }

    #[test]
    fn close_then_cancel_is_illegal() {
        let mut transport = MockTransport::new();
        transport.expect_send_data().times(1).returning(|_, _| Ok(()));
        transport.expect_cancel().never();

        let emitter = open_emitter(transport);
        emitter.close(None).unwrap();

        assert!(emitter.cancel().unwrap_err().is_illegal_state());
        assert!(emitter.close(None).unwrap_err().is_illegal_state());
    }

    #[test]
    fn reset_cancels_a_half_closed_stream_once() {
        let mut transport = MockTransport::new();
        transport.expect_send_data().times(1).returning(|_, _| Ok(()));
        transport.expect_cancel().times(1).returning(|| Err(TransportError::Closed));

        let emitter = open_emitter(transport);
        emitter.close(None).unwrap();

        assert!(emitter.reset());
        assert_eq!(emitter.state(), StreamState::Cancelled);
        assert!(!emitter.reset());
        assert!(!emitter.mark_closed());
    }

    #[test]
    fn sends_before_headers_are_illegal() {
        let mut transport = MockTransport::new();
        transport.expect_send_data().never();
        transport.expect_send_metadata().never();

        let emitter = StreamEmitter::new(StreamId::new(1), transport);

        assert!(emitter.send_data(Bytes::new(), true).unwrap_err().is_illegal_state());
        assert!(emitter.send_metadata(&headers()).unwrap_err().is_illegal_state());
        assert!(emitter.close(None).unwrap_err().is_illegal_state());
        assert_eq!(emitter.state(), StreamState::Idle);
    }

    #[test]
    fn headers_are_sent_only_once() {
        let emitter = open_emitter(MockTransport::new());
        assert!(emitter.send_headers(&headers(), false).unwrap_err().is_illegal_state());
    }

    #[test]
    fn cancel_is_allowed_before_headers() {
        let mut transport = MockTransport::new();
        transport.expect_cancel().times(1).returning(|| Ok(()));
        transport.expect_send_headers().never();

        let emitter = StreamEmitter::new(StreamId::new(1), transport);
        emitter.cancel().unwrap();

        assert!(emitter.send_headers(&headers(), false).unwrap_err().is_illegal_state());
    }

    #[test]
    fn transport_failure_is_returned_and_closes_the_stream() {
        let mut transport = MockTransport::new();
        transport.expect_send_data().times(1).returning(|_, _| Err(TransportError::failure("connection reset")));
        transport.expect_send_metadata().never();

        let emitter = open_emitter(transport);
        let error = emitter.send_data(Bytes::from_static(b"body"), false).unwrap_err();

        assert!(matches!(error, StreamError::Transport { source: TransportError::Failure { .. } }));
        assert_eq!(emitter.state(), StreamState::Closed);
        assert!(emitter.send_metadata(&headers()).unwrap_err().is_illegal_state());
    }

    #[test]
    fn fluent_calls_share_one_stream() {
        let mut transport = MockTransport::new();
        transport.expect_send_data().times(2).returning(|_, _| Ok(()));
        transport.expect_send_metadata().times(1).returning(|_| Ok(()));

        let emitter = open_emitter(transport);
        emitter
            .send_data(Bytes::from_static(b"a"), false)
            .and_then(|emitter| emitter.send_metadata(&headers()))
            .and_then(|emitter| emitter.send_data(Bytes::from_static(b"b"), true))
            .unwrap();

        assert_eq!(emitter.state(), StreamState::HalfClosed);
        assert!(!emitter.clone().is_active());
    }

    #[test]
    fn cancel_from_another_thread_stops_later_sends() {
        let mut transport = MockTransport::new();
        transport.expect_cancel().times(1).returning(|| Ok(()));
        transport.expect_send_data().never();

        let emitter = open_emitter(transport);
        let canceller = emitter.clone();
        std::thread::spawn(move || {
            canceller.cancel().unwrap();
        })
        .join()
        .unwrap();

        assert!(emitter.send_data(Bytes::from_static(b"late"), false).unwrap_err().is_illegal_state());
    }
}
