use std::borrow::Cow;
use std::error::Error;
use std::io;

use thiserror::Error;

use crate::protocol::{Direction, Phase};

/// Boxed error returned by filter callbacks.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("illegal state: {reason}")]
    IllegalState { reason: Cow<'static, str> },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    #[error("{direction} filter #{index} failed during {phase}: {source}")]
    Filter { direction: Direction, index: usize, phase: Phase, source: BoxError },
}

impl StreamError {
    pub fn illegal_state<S: Into<Cow<'static, str>>>(reason: S) -> Self {
        Self::IllegalState { reason: reason.into() }
    }

    pub fn filter<E: Into<BoxError>>(direction: Direction, index: usize, phase: Phase, source: E) -> Self {
        Self::Filter { direction, index, phase, source: source.into() }
    }

    #[inline]
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, StreamError::IllegalState { .. })
    }

    #[inline]
    pub fn is_transport(&self) -> bool {
        matches!(self, StreamError::Transport { .. })
    }

    #[inline]
    pub fn is_filter(&self) -> bool {
        matches!(self, StreamError::Filter { .. })
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport stream is closed")]
    Closed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("transport failure: {reason}")]
    Failure { reason: String },
}

impl TransportError {
    pub fn failure<S: ToString>(str: S) -> Self {
        Self::Failure { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Debug, Error)]
#[error("value of header `{name}` is not visible ascii")]
pub struct InvalidHeader {
    name: String,
}

impl InvalidHeader {
    pub(crate) fn new<S: ToString>(name: S) -> Self {
        Self { name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
