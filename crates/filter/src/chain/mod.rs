//! The ordered filter chain of one stream direction.
//!
//! A [`FilterChain`] owns its filters, one [`FilterRecord`] per filter and the payload
//! parked at filters that stopped iteration. Each `run_*` call drives one phase through
//! the filters in registration order; whatever makes it past the last filter is handed
//! to the chain's [`Sink`].
//!
//! A chain is a plain single threaded state machine. [`crate::client::HttpStream`] puts
//! it behind the stream lock, which is what makes resuming from another thread safe.

mod iteration;

use std::fmt;

use bytes::Bytes;
use micro_stream::ensure;
use micro_stream::protocol::{Direction, Frame, HeaderMap, Phase, StreamError, StreamId};
use tracing::{debug, warn};

use crate::filter::Filter;
use crate::record::FilterRecord;
use iteration::Slot;

/// Receives the frames that passed every filter of a chain.
pub trait Sink {
    fn deliver(&mut self, frame: Frame) -> Result<(), StreamError>;
}

impl Sink for Vec<Frame> {
    fn deliver(&mut self, frame: Frame) -> Result<(), StreamError> {
        self.push(frame);
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    #[inline]
    fn deliver(&mut self, frame: Frame) -> Result<(), StreamError> {
        (**self).deliver(frame)
    }
}

/// Which frames the chain accepts next.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Stage {
    AwaitingHeaders,
    Streaming,
    Ended,
}

impl Stage {
    fn reject(self, phase: Phase) -> StreamError {
        let reason = match self {
            Stage::AwaitingHeaders => "headers were not received yet",
            Stage::Streaming => "headers were already received",
            Stage::Ended => "the stream already ended",
        };
        StreamError::illegal_state(format!("can not process {phase}, {reason}"))
    }
}

pub struct FilterChain {
    direction: Direction,
    stream: StreamId,
    slots: Vec<Slot>,
    stage: Stage,
    aborted: bool,
}

impl FilterChain {
    pub fn builder(direction: Direction) -> FilterChainBuilder {
        FilterChainBuilder::new(direction)
    }

    pub fn new(direction: Direction, stream: StreamId, filters: Vec<Box<dyn Filter>>) -> Self {
        let slots = filters.into_iter().map(Slot::new).collect();
        Self { direction, stream, slots, stage: Stage::AwaitingHeaders, aborted: false }
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true once a phase failed or the chain was notified of an error or cancel.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Returns true once the final frame of the direction entered the chain.
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.stage == Stage::Ended
    }

    pub fn record(&self, index: usize) -> Option<&FilterRecord> {
        self.slots.get(index).map(|slot| &slot.record)
    }

    /// Returns the first filter holding iteration, with the phase it stopped.
    pub fn stopped_at(&self) -> Option<(usize, Phase)> {
        self.slots.iter().enumerate().find_map(|(index, slot)| slot.record.stopped().map(|phase| (index, phase)))
    }

    pub fn run_headers<S: Sink + ?Sized>(
        &mut self,
        headers: HeaderMap,
        end_stream: bool,
        sink: &mut S,
    ) -> Result<(), StreamError> {
        self.accept(Phase::Headers, end_stream)?;
        self.dispatch(Frame::headers(headers, end_stream), sink)
    }

    pub fn run_data<S: Sink + ?Sized>(&mut self, data: Bytes, end_stream: bool, sink: &mut S) -> Result<(), StreamError> {
        self.accept(Phase::Data, end_stream)?;
        self.dispatch(Frame::data(data, end_stream), sink)
    }

    pub fn run_trailers<S: Sink + ?Sized>(&mut self, trailers: HeaderMap, sink: &mut S) -> Result<(), StreamError> {
        self.accept(Phase::Trailers, true)?;
        self.dispatch(Frame::trailers(trailers), sink)
    }

    /// Resumes the first stopped filter.
    ///
    /// The stopping filter is not invoked again: the headers, data and trailers parked
    /// at it are passed, in that order, to the filter after it.
    pub fn continue_iteration<S: Sink + ?Sized>(&mut self, sink: &mut S) -> Result<(), StreamError> {
        ensure!(!self.aborted, self.rejected());
        let Some((index, _)) = self.stopped_at() else {
            return Err(StreamError::illegal_state(format!("can not continue {}, no filter stopped iteration", self.direction)));
        };

        let result = self.resume_at(index, sink);
        self.settle(result)
    }

    /// Tells every filter the stream failed; the chain accepts nothing afterwards.
    pub fn notify_error(&mut self, error: &StreamError) {
        self.aborted = true;
        for slot in &mut self.slots {
            slot.filter.on_error(error);
        }
    }

    /// Tells every filter the stream was cancelled; the chain accepts nothing afterwards.
    pub fn notify_cancel(&mut self) {
        self.aborted = true;
        for slot in &mut self.slots {
            slot.filter.on_cancel();
        }
    }

    fn accept(&mut self, phase: Phase, end_stream: bool) -> Result<(), StreamError> {
        ensure!(!self.aborted, self.rejected());

        let expected = match phase {
            Phase::Headers => Stage::AwaitingHeaders,
            Phase::Data | Phase::Trailers => Stage::Streaming,
        };
        ensure!(self.stage == expected, self.stage.reject(phase));

        self.stage = if end_stream { Stage::Ended } else { Stage::Streaming };
        Ok(())
    }

    fn dispatch<S: Sink + ?Sized>(&mut self, frame: Frame, sink: &mut S) -> Result<(), StreamError> {
        let result = self.run(0, frame, sink);
        self.settle(result)
    }

    fn settle(&mut self, result: Result<(), StreamError>) -> Result<(), StreamError> {
        if let Err(e) = &result {
            warn!(stream = %self.stream, direction = %self.direction, cause = %e, "filter chain aborted");
            self.aborted = true;
        }
        result
    }

    fn rejected(&self) -> StreamError {
        debug!(stream = %self.stream, direction = %self.direction, "filter chain is aborted");
        StreamError::illegal_state(format!("{} filter chain is aborted", self.direction))
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("direction", &self.direction)
            .field("stream", &self.stream)
            .field("filters", &self.slots.len())
            .field("stage", &self.stage)
            .field("aborted", &self.aborted)
            .finish()
    }
}

/// Collects the filters of a chain; `add_last` appends, `add_first` prepends.
pub struct FilterChainBuilder {
    direction: Direction,
    filters: Vec<Box<dyn Filter>>,
}

impl fmt::Debug for FilterChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChainBuilder").field("direction", &self.direction).field("filters", &self.filters.len()).finish()
    }
}

impl FilterChainBuilder {
    fn new(direction: Direction) -> Self {
        Self { direction, filters: vec![] }
    }

    pub fn add_last<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn add_first<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.insert(0, Box::new(filter));
        self
    }

    pub fn build(self, stream: StreamId) -> FilterChain {
        FilterChain::new(self.direction, stream, self.filters)
    }
}
