//! Binding of filter chains, an emitter and application callbacks into one stream.
//!
//! A [`StreamClient`] holds the filter factories and is shared by all streams. Each
//! [`StreamClient::start`] creates a fresh request and response [`FilterChain`] and
//! returns an [`HttpStream`] driving them:
//!
//! - the application pushes the request through [`HttpStream::send_headers`],
//!   [`HttpStream::send_data`] and [`HttpStream::close`]; what passes the request
//!   filters goes to the [`StreamEmitter`]
//! - the transport pushes the response through [`HttpStream::on_headers`],
//!   [`HttpStream::on_data`] and [`HttpStream::on_trailers`]; what passes the response
//!   filters goes to the [`StreamCallbacks`]
//!
//! Every stream ends with exactly one of `on_complete`, `on_error` or `on_cancel`.
//!
//! The per-stream lock is not re-entrant: filters and callbacks must not call back
//! into their own [`HttpStream`].

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use micro_stream::emitter::StreamEmitter;
use micro_stream::ensure;
use micro_stream::protocol::{Direction, Frame, HeaderMap, Request, StreamError, StreamId, StreamState, TransportError};
use micro_stream::stats::{Counter, Element, EngineHandle};
use micro_stream::transport::Transport;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::chain::{FilterChain, Sink};
use crate::filter::FilterFactory;

/// Application side receiver of the response.
///
/// All methods default to doing nothing.
pub trait StreamCallbacks: Send {
    fn on_headers(&mut self, _headers: HeaderMap, _end_stream: bool) {}

    fn on_data(&mut self, _data: Bytes, _end_stream: bool) {}

    fn on_trailers(&mut self, _trailers: HeaderMap) {}

    /// The response ended; nothing is delivered afterwards.
    fn on_complete(&mut self) {}

    /// The stream failed; nothing is delivered afterwards.
    fn on_error(&mut self, _error: &StreamError) {}

    /// The stream was cancelled; nothing is delivered afterwards.
    fn on_cancel(&mut self) {}
}

impl StreamCallbacks for () {}

pub struct StreamClient {
    request_filters: Vec<Box<dyn FilterFactory>>,
    response_filters: Vec<Box<dyn FilterFactory>>,
    counters: Option<StreamCounters>,
    next_id: AtomicU64,
}

impl StreamClient {
    pub fn builder() -> StreamClientBuilder {
        StreamClientBuilder::new()
    }

    /// Starts a stream over `transport`, delivering the response to `callbacks`.
    pub fn start<T, C>(&self, transport: T, callbacks: C) -> HttpStream<T, C>
    where
        T: Transport,
        C: StreamCallbacks,
    {
        let id = StreamId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = FilterChain::new(Direction::Request, id, self.request_filters.iter().map(|f| f.create()).collect());
        let response = FilterChain::new(Direction::Response, id, self.response_filters.iter().map(|f| f.create()).collect());

        debug!(stream = %id, request_filters = request.len(), response_filters = response.len(), "start stream");
        if let Some(counters) = &self.counters {
            counters.started.increment();
        }

        HttpStream {
            inner: Arc::new(StreamInner {
                emitter: StreamEmitter::new(id, transport),
                counters: self.counters.clone(),
                core: Mutex::new(StreamCore { request, response, callbacks, finished: false }),
            }),
        }
    }
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("request_filters", &self.request_filters.len())
            .field("response_filters", &self.response_filters.len())
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

pub struct StreamClientBuilder {
    request_filters: Vec<Box<dyn FilterFactory>>,
    response_filters: Vec<Box<dyn FilterFactory>>,
    stats: Option<EngineHandle>,
}

impl fmt::Debug for StreamClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClientBuilder")
            .field("request_filters", &self.request_filters.len())
            .field("response_filters", &self.response_filters.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl StreamClientBuilder {
    fn new() -> Self {
        Self { request_filters: vec![], response_filters: vec![], stats: None }
    }

    /// Appends a request filter; request filters run in the order they were added.
    pub fn add_request_filter<F: FilterFactory + 'static>(mut self, factory: F) -> Self {
        self.request_filters.push(Box::new(factory));
        self
    }

    /// Appends a response filter; response filters run in the order they were added.
    pub fn add_response_filter<F: FilterFactory + 'static>(mut self, factory: F) -> Self {
        self.response_filters.push(Box::new(factory));
        self
    }

    /// Records `stream.started`, `stream.completed`, `stream.cancelled` and
    /// `stream.failed` against the given engine.
    pub fn stats(mut self, engine: EngineHandle) -> Self {
        self.stats = Some(engine);
        self
    }

    pub fn build(self) -> StreamClient {
        StreamClient {
            request_filters: self.request_filters,
            response_filters: self.response_filters,
            counters: self.stats.as_ref().map(StreamCounters::new),
            next_id: AtomicU64::new(1),
        }
    }
}

#[derive(Debug, Clone)]
struct StreamCounters {
    started: Counter,
    completed: Counter,
    cancelled: Counter,
    failed: Counter,
}

impl StreamCounters {
    fn new(engine: &EngineHandle) -> Self {
        let counter = |name| engine.counter([Element::from_static("stream"), Element::from_static(name)]);
        Self {
            started: counter("started"),
            completed: counter("completed"),
            cancelled: counter("cancelled"),
            failed: counter("failed"),
        }
    }
}

/// A started stream; clones share the stream.
pub struct HttpStream<T, C> {
    inner: Arc<StreamInner<T, C>>,
}

struct StreamInner<T, C> {
    emitter: StreamEmitter<T>,
    counters: Option<StreamCounters>,
    core: Mutex<StreamCore<C>>,
}

struct StreamCore<C> {
    request: FilterChain,
    response: FilterChain,
    callbacks: C,
    finished: bool,
}

impl<C> StreamCore<C> {
    /// Marks the stream finished, returns false if it already was.
    fn finish(&mut self) -> bool {
        !mem::replace(&mut self.finished, true)
    }
}

impl<T, C> Clone for HttpStream<T, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Transport, C: StreamCallbacks> HttpStream<T, C> {
    #[inline]
    pub fn id(&self) -> StreamId {
        self.inner.emitter.id()
    }

    pub fn emitter(&self) -> &StreamEmitter<T> {
        &self.inner.emitter
    }

    /// Sends a whole request: its outbound headers, body and trailers.
    pub fn send_request(&self, request: &Request) -> Result<(), StreamError> {
        let has_trailers = !request.trailers().is_empty();
        let body = request.body();

        self.send_headers(request.outbound_headers(), body.is_none() && !has_trailers)?;
        if let Some(body) = body {
            self.send_data(body.clone(), !has_trailers)?;
        }
        if has_trailers {
            self.close(Some(request.trailers().clone()))?;
        }
        Ok(())
    }

    pub fn send_headers(&self, headers: HeaderMap, end_stream: bool) -> Result<(), StreamError> {
        self.outbound(|chain, sink| chain.run_headers(headers, end_stream, sink))
    }

    pub fn send_data(&self, data: Bytes, end_stream: bool) -> Result<(), StreamError> {
        self.outbound(|chain, sink| chain.run_data(data, end_stream, sink))
    }

    /// Ends the request with trailers, or with an empty end of stream data frame.
    pub fn close(&self, trailers: Option<HeaderMap>) -> Result<(), StreamError> {
        match trailers {
            Some(trailers) => self.outbound(|chain, sink| chain.run_trailers(trailers, sink)),
            None => self.outbound(|chain, sink| chain.run_data(Bytes::new(), true, sink)),
        }
    }

    /// Sends metadata straight to the emitter, filters do not see it.
    pub fn send_metadata(&self, metadata: &HeaderMap) -> Result<(), StreamError> {
        let mut guard = self.inner.core.lock();
        let core = &mut *guard;
        ensure!(!core.finished, self.rejected());

        let result = self.inner.emitter.send_metadata(metadata).map(|_| ());
        self.settle(core, result)
    }

    /// Resumes the request filter chain.
    pub fn continue_request(&self) -> Result<(), StreamError> {
        self.outbound(|chain, sink| chain.continue_iteration(sink))
    }

    /// Resumes the response filter chain.
    pub fn continue_response(&self) -> Result<(), StreamError> {
        self.inbound(|chain, sink| chain.continue_iteration(sink))
    }

    /// Cancels the stream.
    ///
    /// The emitter is flipped before the stream lock is taken, so a phase running on
    /// another thread fails on its next send. That phase then finishes the stream as
    /// cancelled, and this call still succeeds.
    pub fn cancel(&self) -> Result<(), StreamError> {
        let reset = self.inner.emitter.reset();

        let mut core = self.inner.core.lock();
        ensure!(reset || !core.finished, StreamError::illegal_state(format!("can not cancel finished stream {}", self.id())));
        self.cancelled(&mut core);
        Ok(())
    }

    /// Response headers arrived from the transport.
    pub fn on_headers(&self, headers: HeaderMap, end_stream: bool) -> Result<(), StreamError> {
        self.inbound(|chain, sink| chain.run_headers(headers, end_stream, sink))
    }

    /// Response data arrived from the transport.
    pub fn on_data(&self, data: Bytes, end_stream: bool) -> Result<(), StreamError> {
        self.inbound(|chain, sink| chain.run_data(data, end_stream, sink))
    }

    /// Response trailers arrived from the transport.
    pub fn on_trailers(&self, trailers: HeaderMap) -> Result<(), StreamError> {
        self.inbound(|chain, sink| chain.run_trailers(trailers, sink))
    }

    /// The transport failed the stream.
    pub fn on_error(&self, error: TransportError) {
        self.inner.emitter.mark_closed();

        let mut core = self.inner.core.lock();
        if !core.finish() {
            debug!(stream = %self.id(), cause = %error, "transport error after stream finished");
            return;
        }

        let error = StreamError::from(error);
        warn!(stream = %self.id(), cause = %error, "stream failed");
        self.failed(&mut core, &error);
    }

    /// The remote peer or the transport cancelled the stream.
    pub fn on_cancel(&self) {
        self.inner.emitter.mark_closed();

        let mut core = self.inner.core.lock();
        self.cancelled(&mut core);
    }

    fn outbound<F>(&self, run: F) -> Result<(), StreamError>
    where
        F: FnOnce(&mut FilterChain, &mut EmitterSink<'_, T>) -> Result<(), StreamError>,
    {
        let mut guard = self.inner.core.lock();
        let core = &mut *guard;
        ensure!(!core.finished, self.rejected());

        let mut sink = EmitterSink { emitter: &self.inner.emitter };
        let result = run(&mut core.request, &mut sink);
        self.settle(core, result)
    }

    fn inbound<F>(&self, run: F) -> Result<(), StreamError>
    where
        F: FnOnce(&mut FilterChain, &mut CallbackSink<'_, C>) -> Result<(), StreamError>,
    {
        let mut guard = self.inner.core.lock();
        let core = &mut *guard;
        ensure!(!core.finished, self.rejected());

        let mut sink = CallbackSink { callbacks: &mut core.callbacks, complete: false };
        let result = run(&mut core.response, &mut sink);
        let complete = sink.complete;

        if result.is_ok() && complete && core.finish() {
            debug!(stream = %self.id(), "stream complete");
            self.inner.emitter.mark_closed();
            core.callbacks.on_complete();
            self.count(|counters| &counters.completed);
        }
        self.settle(core, result)
    }

    fn settle(&self, core: &mut StreamCore<C>, result: Result<(), StreamError>) -> Result<(), StreamError> {
        if let Err(error) = &result {
            if self.inner.emitter.state() == StreamState::Cancelled {
                // a concurrent cancel got to the emitter first
                self.cancelled(core);
            } else if error.is_transport() || core.request.is_aborted() || core.response.is_aborted() {
                self.inner.emitter.reset();
                if core.finish() {
                    self.failed(core, error);
                }
            }
        }
        result
    }

    fn failed(&self, core: &mut StreamCore<C>, error: &StreamError) {
        core.request.notify_error(error);
        core.response.notify_error(error);
        core.callbacks.on_error(error);
        self.count(|counters| &counters.failed);
    }

    fn cancelled(&self, core: &mut StreamCore<C>) {
        if !core.finish() {
            return;
        }

        debug!(stream = %self.id(), "stream cancelled");
        core.request.notify_cancel();
        core.response.notify_cancel();
        core.callbacks.on_cancel();
        self.count(|counters| &counters.cancelled);
    }

    fn count<F: FnOnce(&StreamCounters) -> &Counter>(&self, select: F) {
        if let Some(counters) = &self.inner.counters {
            select(counters).increment();
        }
    }

    fn rejected(&self) -> StreamError {
        StreamError::illegal_state(format!("stream {} is finished", self.id()))
    }
}

impl<T: Transport, C> fmt::Debug for HttpStream<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStream")
            .field("id", &self.inner.emitter.id())
            .field("state", &self.inner.emitter.state())
            .finish_non_exhaustive()
    }
}

/// Hands request frames that passed every filter to the emitter.
struct EmitterSink<'a, T> {
    emitter: &'a StreamEmitter<T>,
}

impl<T: Transport> Sink for EmitterSink<'_, T> {
    fn deliver(&mut self, frame: Frame) -> Result<(), StreamError> {
        match frame {
            Frame::Headers { headers, end_stream } => self.emitter.send_headers(&headers, end_stream),
            Frame::Data { data, end_stream } => self.emitter.send_data(data, end_stream),
            Frame::Trailers(trailers) => self.emitter.close(Some(&trailers)),
        }
        .map(|_| ())
    }
}

/// Hands response frames that passed every filter to the application.
struct CallbackSink<'a, C> {
    callbacks: &'a mut C,
    complete: bool,
}

impl<C: StreamCallbacks> Sink for CallbackSink<'_, C> {
    fn deliver(&mut self, frame: Frame) -> Result<(), StreamError> {
        self.complete |= frame.end_stream();
        match frame {
            Frame::Headers { headers, end_stream } => self.callbacks.on_headers(headers, end_stream),
            Frame::Data { data, end_stream } => self.callbacks.on_data(data, end_stream),
            Frame::Trailers(trailers) => self.callbacks.on_trailers(trailers),
        }
        Ok(())
    }
}
