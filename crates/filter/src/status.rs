//! Statuses returned by filter callbacks.
//!
//! Each phase has its own sum type; the iteration engine matches them exhaustively,
//! so a new status can not be silently ignored.
//!
//! `ResumeIteration` may only be returned by a filter that stopped an earlier phase.
//! It is an error to include headers once they were forwarded to the next filter
//! (iteration was stopped during data or trailers instead of headers), and headers are
//! required when iteration was stopped during headers.

use bytes::Bytes;
use micro_stream::protocol::HeaderMap;

/// Status returned when a filter receives headers.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadersStatus {
    /// Continue iteration, passing the (possibly modified) headers to the next filter.
    Continue(HeaderMap),

    /// Do not pass the headers to the remaining filters.
    ///
    /// Returning `Continue` from a later data or trailers callback, returning
    /// `ResumeIteration`, or calling `continue_request()`/`continue_response()` resumes.
    StopIteration,
}

/// Status returned when a filter receives a chunk of body data.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataStatus {
    /// Continue iteration with the given data.
    ///
    /// If headers were stopped by this filter, they are forwarded first.
    Continue(Bytes),

    /// Do not pass data on, and buffer it for later dispatch.
    ///
    /// The next data callback of this filter receives everything buffered so far plus
    /// the new chunk.
    StopIterationAndBuffer,

    /// Do not pass data on and do not buffer it: the filter takes ownership of the chunk.
    ///
    /// Only the end of stream flag is remembered for the eventual resume.
    StopIterationNoBuffer,

    /// Resume iteration stopped by this filter during headers or data.
    ///
    /// `data: None` forwards whatever the chain holds for this filter.
    ResumeIteration { headers: Option<HeaderMap>, data: Option<Bytes> },
}

/// Status returned when a filter receives trailers.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailersStatus {
    /// Continue iteration, passing the (possibly modified) trailers to the next filter.
    ///
    /// Headers and data held back by this filter are forwarded first.
    Continue(HeaderMap),

    /// Do not pass the trailers to the remaining filters.
    StopIteration,

    /// Resume iteration stopped by this filter during headers or data.
    ///
    /// `data: None` forwards the data buffered for this filter, `trailers: None`
    /// forwards the trailers the filter was called with.
    ResumeIteration { headers: Option<HeaderMap>, data: Option<Bytes>, trailers: Option<HeaderMap> },
}

impl HeadersStatus {
    #[inline]
    pub fn is_stop(&self) -> bool {
        matches!(self, HeadersStatus::StopIteration)
    }
}

impl DataStatus {
    #[inline]
    pub fn is_stop(&self) -> bool {
        matches!(self, DataStatus::StopIterationAndBuffer | DataStatus::StopIterationNoBuffer)
    }

    pub fn resume(headers: Option<HeaderMap>, data: Option<Bytes>) -> Self {
        DataStatus::ResumeIteration { headers, data }
    }
}

impl TrailersStatus {
    #[inline]
    pub fn is_stop(&self) -> bool {
        matches!(self, TrailersStatus::StopIteration)
    }

    pub fn resume(headers: Option<HeaderMap>, data: Option<Bytes>, trailers: Option<HeaderMap>) -> Self {
        TrailersStatus::ResumeIteration { headers, data, trailers }
    }
}
