use std::mem;

use bytes::{Bytes, BytesMut};
use micro_stream::protocol::{BoxError, Direction, Frame, HeaderMap, Phase, StreamError, StreamId};
use tracing::{debug, trace, warn};

use super::{FilterChain, Sink};
use crate::filter::Filter;
use crate::record::FilterRecord;
use crate::status::{DataStatus, HeadersStatus, TrailersStatus};

/// One filter together with its record and the payload parked at it.
pub(super) struct Slot {
    pub(super) filter: Box<dyn Filter>,
    pub(super) record: FilterRecord,
    parked: Parked,
}

/// Payload held back at a stopped filter.
#[derive(Debug, Default)]
struct Parked {
    headers: Option<(HeaderMap, bool)>,
    data: Option<Bytes>,
    data_end: bool,
    trailers: Option<HeaderMap>,
}

/// What the chain does after one filter returned.
enum Step {
    /// pass the frame to the next filter
    Forward(Frame),
    /// the filter holds iteration
    Held,
    /// the filter resumed: these frames continue at the next filter, in order
    Release(Vec<Frame>),
}

/// Where in the chain a filter runs, for errors and logs.
#[derive(Debug, Copy, Clone)]
struct Site {
    direction: Direction,
    stream: StreamId,
    index: usize,
}

impl Site {
    fn failed(self, phase: Phase, source: BoxError) -> StreamError {
        warn!(stream = %self.stream, direction = %self.direction, index = self.index, %phase, cause = %source, "filter failed");
        StreamError::filter(self.direction, self.index, phase, source)
    }
}

impl FilterChain {
    /// Moves `frame` through the filters from `start` on, delivering it to `sink` if
    /// no filter holds it.
    pub(super) fn run<S: Sink + ?Sized>(&mut self, start: usize, mut frame: Frame, sink: &mut S) -> Result<(), StreamError> {
        for index in start..self.slots.len() {
            let site = Site { direction: self.direction, stream: self.stream, index };
            match self.slots[index].step(site, frame)? {
                Step::Forward(next) => frame = next,
                Step::Held => return Ok(()),
                Step::Release(frames) => {
                    for frame in frames {
                        self.run(index + 1, frame, sink)?;
                    }
                    return Ok(());
                }
            }
        }

        debug!(
            stream = %self.stream,
            direction = %self.direction,
            phase = %frame.phase(),
            end_stream = frame.end_stream(),
            "deliver frame"
        );
        sink.deliver(frame)
    }

    /// Resumes the filter at `index` without invoking it again.
    pub(super) fn resume_at<S: Sink + ?Sized>(&mut self, index: usize, sink: &mut S) -> Result<(), StreamError> {
        let slot = &mut self.slots[index];
        let phase = slot.record.resume()?;
        let frames = slot.parked.drain();
        debug!(stream = %self.stream, direction = %self.direction, index, %phase, frames = frames.len(), "continue iteration");

        for frame in frames {
            self.run(index + 1, frame, sink)?;
        }
        Ok(())
    }
}

impl Slot {
    pub(super) fn new(filter: Box<dyn Filter>) -> Self {
        Self { filter, record: FilterRecord::new(), parked: Parked::default() }
    }

    fn step(&mut self, site: Site, frame: Frame) -> Result<Step, StreamError> {
        trace!(stream = %site.stream, direction = %site.direction, index = site.index, phase = %frame.phase(), "invoke filter");
        match frame {
            Frame::Headers { headers, end_stream } => self.headers(site, headers, end_stream),
            Frame::Data { data, end_stream } => self.data(site, data, end_stream),
            Frame::Trailers(trailers) => self.trailers(site, trailers),
        }
    }

    fn headers(&mut self, site: Site, headers: HeaderMap, end_stream: bool) -> Result<Step, StreamError> {
        let status = self.filter.on_headers(headers.clone(), end_stream).map_err(|e| site.failed(Phase::Headers, e))?;

        match status {
            HeadersStatus::Continue(headers) => self.pass(site, Frame::headers(headers, end_stream)),
            HeadersStatus::StopIteration => {
                self.record.stop(Phase::Headers)?;
                self.parked.headers = Some((headers, end_stream));
                debug!(stream = %site.stream, direction = %site.direction, index = site.index, "headers stopped");
                Ok(Step::Held)
            }
        }
    }

    fn data(&mut self, site: Site, data: Bytes, end_stream: bool) -> Result<Step, StreamError> {
        // a filter that buffered earlier chunks sees everything buffered so far
        let data = self.parked.join_data(data);
        let status = self.filter.on_data(data.clone(), end_stream).map_err(|e| site.failed(Phase::Data, e))?;

        match status {
            DataStatus::Continue(data) => self.pass(site, Frame::data(data, end_stream)),
            DataStatus::StopIterationAndBuffer => {
                self.record.stop(Phase::Data)?;
                debug!(stream = %site.stream, direction = %site.direction, index = site.index, buffered = data.len(), "data stopped");
                self.parked.data = Some(data);
                self.parked.data_end = end_stream;
                Ok(Step::Held)
            }
            DataStatus::StopIterationNoBuffer => {
                self.record.stop(Phase::Data)?;
                debug!(stream = %site.stream, direction = %site.direction, index = site.index, "data stopped without buffering");
                self.parked.data_end = end_stream;
                Ok(Step::Held)
            }
            DataStatus::ResumeIteration { headers, data: replaced } => {
                let mut frames = self.resume_with(site, headers)?;
                frames.push(Frame::data(replaced.unwrap_or(data), end_stream));
                self.record.forward(Phase::Data)?;
                Ok(Step::Release(frames))
            }
        }
    }

    fn trailers(&mut self, site: Site, trailers: HeaderMap) -> Result<Step, StreamError> {
        let status = self.filter.on_trailers(trailers.clone()).map_err(|e| site.failed(Phase::Trailers, e))?;

        match status {
            TrailersStatus::Continue(trailers) => self.pass(site, Frame::trailers(trailers)),
            TrailersStatus::StopIteration => {
                self.record.stop(Phase::Trailers)?;
                self.parked.trailers = Some(trailers);
                debug!(stream = %site.stream, direction = %site.direction, index = site.index, "trailers stopped");
                Ok(Step::Held)
            }
            TrailersStatus::ResumeIteration { headers, data, trailers: replaced } => {
                let mut frames = self.resume_with(site, headers)?;
                if let Some(data) = data.or_else(|| self.parked.data.take()) {
                    frames.push(Frame::data(data, false));
                }
                self.parked.data_end = false;
                frames.push(Frame::trailers(replaced.unwrap_or(trailers)));
                self.record.forward(Phase::Trailers)?;
                Ok(Step::Release(frames))
            }
        }
    }

    /// Handles `Continue`: forwards the frame, or resumes first if this filter holds
    /// iteration from an earlier phase.
    fn pass(&mut self, site: Site, frame: Frame) -> Result<Step, StreamError> {
        let phase = frame.phase();
        if self.record.stopped().is_none() {
            self.record.forward(phase)?;
            return Ok(Step::Forward(frame));
        }

        let resumed = self.record.resume()?;
        self.record.forward(phase)?;
        debug!(stream = %site.stream, direction = %site.direction, index = site.index, %resumed, %phase, "iteration resumed by continue");

        let mut frames = self.parked.drain();
        frames.push(frame);
        Ok(Step::Release(frames))
    }

    /// Validates a `ResumeIteration` status and resumes the stopped phase.
    ///
    /// Returns the headers frame to release when headers were stopped.
    fn resume_with(&mut self, site: Site, headers: Option<HeaderMap>) -> Result<Vec<Frame>, StreamError> {
        let Some(stopped) = self.record.stopped() else {
            return Err(StreamError::illegal_state(format!(
                "{} filter #{} returned ResumeIteration but iteration is not stopped",
                site.direction, site.index
            )));
        };

        let mut frames = Vec::with_capacity(3);
        match (stopped, headers) {
            (Phase::Headers, Some(headers)) => {
                let end_stream = self.parked.headers.take().is_some_and(|(_, end_stream)| end_stream);
                frames.push(Frame::headers(headers, end_stream));
            }
            (Phase::Headers, None) => {
                return Err(StreamError::illegal_state("headers are required to resume iteration stopped during headers"));
            }
            (_, Some(_)) => {
                return Err(StreamError::illegal_state("headers were already forwarded, can not resume iteration with headers"));
            }
            (_, None) => {}
        }

        self.record.resume()?;
        debug!(stream = %site.stream, direction = %site.direction, index = site.index, phase = %stopped, "iteration resumed");
        Ok(frames)
    }
}

impl Parked {
    fn join_data(&mut self, chunk: Bytes) -> Bytes {
        match self.data.take() {
            Some(buffered) if !buffered.is_empty() => {
                let mut joined = BytesMut::with_capacity(buffered.len() + chunk.len());
                joined.extend_from_slice(&buffered);
                joined.extend_from_slice(&chunk);
                joined.freeze()
            }
            _ => chunk,
        }
    }

    fn drain(&mut self) -> Vec<Frame> {
        let Parked { headers, data, data_end, trailers } = mem::take(self);

        let mut frames = Vec::with_capacity(3);
        if let Some((headers, end_stream)) = headers {
            frames.push(Frame::headers(headers, end_stream));
        }
        if data.is_some() || data_end {
            frames.push(Frame::data(data.unwrap_or_default(), data_end));
        }
        if let Some(trailers) = trailers {
            frames.push(Frame::trailers(trailers));
        }
        frames
    }
}
