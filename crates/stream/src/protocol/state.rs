use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a stream as seen by its emitter.
///
/// `Idle → HeadersSent → DataSent* → HalfClosed → Closed`, with `Cancelled`
/// reachable from every non-terminal state. Local operations treat `HalfClosed`
/// as terminal too: once the local side ended the stream nothing more may be sent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamState {
    Idle = 0,
    HeadersSent = 1,
    DataSent = 2,
    HalfClosed = 3,
    Closed = 4,
    Cancelled = 5,
}

impl StreamState {
    /// Returns true if headers went out and the local side has not ended the stream
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, StreamState::HeadersSent | StreamState::DataSent)
    }

    /// Returns true if no further local operation is allowed
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::HalfClosed | StreamState::Closed | StreamState::Cancelled)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => StreamState::Idle,
            1 => StreamState::HeadersSent,
            2 => StreamState::DataSent,
            3 => StreamState::HalfClosed,
            4 => StreamState::Closed,
            _ => StreamState::Cancelled,
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Idle => "idle",
            StreamState::HeadersSent => "headers sent",
            StreamState::DataSent => "data sent",
            StreamState::HalfClosed => "half closed",
            StreamState::Closed => "closed",
            StreamState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Identifies a stream in logs and in transport bookkeeping.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(u64);

impl StreamId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// A `StreamState` cell whose transitions are atomic compare-and-swap steps.
#[derive(Debug)]
pub(crate) struct AtomicStreamState(AtomicU8);

impl AtomicStreamState {
    pub(crate) fn new(state: StreamState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn load(&self) -> StreamState {
        StreamState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Applies `next` to the current state until it wins the race.
    ///
    /// Returns the previous state on success, or the state `next` refused to leave.
    pub(crate) fn transition<F>(&self, mut next: F) -> Result<StreamState, StreamState>
    where
        F: FnMut(StreamState) -> Option<StreamState>,
    {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| next(StreamState::from_u8(raw)).map(|state| state as u8))
            .map(StreamState::from_u8)
            .map_err(StreamState::from_u8)
    }
}
