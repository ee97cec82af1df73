use std::fmt;

use bytes::Bytes;

use crate::protocol::HeaderMap;

/// Represents one unit of stream payload moving through a filter chain.
///
/// Frames arrive strictly in phase order for a stream: one `Headers` frame,
/// zero or more `Data` frames, then optionally `Trailers`. Trailers always end the
/// stream, headers and data end it when `end_stream` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The header block of the stream
    Headers { headers: HeaderMap, end_stream: bool },
    /// A chunk of body data
    Data { data: Bytes, end_stream: bool },
    /// The trailer block, implicitly ending the stream
    Trailers(HeaderMap),
}

impl Frame {
    #[inline]
    pub fn headers(headers: HeaderMap, end_stream: bool) -> Self {
        Self::Headers { headers, end_stream }
    }

    #[inline]
    pub fn data(data: Bytes, end_stream: bool) -> Self {
        Self::Data { data, end_stream }
    }

    #[inline]
    pub fn trailers(trailers: HeaderMap) -> Self {
        Self::Trailers(trailers)
    }

    /// Returns the phase this frame belongs to
    #[inline]
    pub fn phase(&self) -> Phase {
        match self {
            Frame::Headers { .. } => Phase::Headers,
            Frame::Data { .. } => Phase::Data,
            Frame::Trailers(_) => Phase::Trailers,
        }
    }

    /// Returns true if no frame may follow this one
    #[inline]
    pub fn end_stream(&self) -> bool {
        match self {
            Frame::Headers { end_stream, .. } | Frame::Data { end_stream, .. } => *end_stream,
            Frame::Trailers(_) => true,
        }
    }
}

/// A stage of stream payload delivery.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Headers,
    Data,
    Trailers,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Headers, Phase::Data, Phase::Trailers];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Headers => f.write_str("headers"),
            Phase::Data => f.write_str("data"),
            Phase::Trailers => f.write_str("trailers"),
        }
    }
}

/// The path a frame travels: outbound to the transport, or inbound to the application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Request => f.write_str("request"),
            Direction::Response => f.write_str("response"),
        }
    }
}
