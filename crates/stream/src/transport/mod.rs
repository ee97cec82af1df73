//! The transport collaborator seam.
//!
//! The transport performs the actual network I/O for a stream. This crate only
//! talks to it through [`Transport`]: the [`StreamEmitter`](crate::emitter::StreamEmitter)
//! checks stream liveness, then delegates each operation here.
//!
//! [`channel()`] provides an in-memory transport that turns every operation into a
//! [`TransportEvent`], which is useful for tests, examples and for bridging the
//! synchronous pipeline into an async writer task.

use std::sync::Arc;

use bytes::Bytes;

use crate::protocol::{HeaderMap, TransportError};

mod channel;
pub use channel::{channel, ChannelTransport, TransportEvent, TransportEvents};

/// Outbound operations the pipeline needs from the underlying network stream.
///
/// Implementations must be shareable across threads: a cancel may race with an
/// in-flight send issued from another thread.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn send_headers(&self, headers: &HeaderMap, end_stream: bool) -> Result<(), TransportError>;

    fn send_data(&self, data: Bytes, end_stream: bool) -> Result<(), TransportError>;

    fn send_metadata(&self, metadata: &HeaderMap) -> Result<(), TransportError>;

    fn send_trailers(&self, trailers: &HeaderMap) -> Result<(), TransportError>;

    fn cancel(&self) -> Result<(), TransportError>;
}

macro_rules! delegate_transport {
    ($ty:ty) => {
        impl<T: Transport + ?Sized> Transport for $ty {
            #[inline]
            fn send_headers(&self, headers: &HeaderMap, end_stream: bool) -> Result<(), TransportError> {
                (**self).send_headers(headers, end_stream)
            }

            #[inline]
            fn send_data(&self, data: Bytes, end_stream: bool) -> Result<(), TransportError> {
                (**self).send_data(data, end_stream)
            }

            #[inline]
            fn send_metadata(&self, metadata: &HeaderMap) -> Result<(), TransportError> {
                (**self).send_metadata(metadata)
            }

            #[inline]
            fn send_trailers(&self, trailers: &HeaderMap) -> Result<(), TransportError> {
                (**self).send_trailers(trailers)
            }

            #[inline]
            fn cancel(&self) -> Result<(), TransportError> {
                (**self).cancel()
            }
        }
    };
}

delegate_transport!(Arc<T>);
delegate_transport!(Box<T>);
