//! The filter trait and the factories that create filters per stream.

use bytes::Bytes;
use micro_stream::protocol::{BoxError, HeaderMap, StreamError};

use crate::status::{DataStatus, HeadersStatus, TrailersStatus};

pub type FilterResult<S> = Result<S, BoxError>;

/// Intercepts the payload of one stream direction.
///
/// Every callback defaults to passing its payload through unchanged, so a filter only
/// implements the phases it cares about. A callback returning an error aborts the
/// stream.
pub trait Filter: Send {
    fn on_headers(&mut self, headers: HeaderMap, _end_stream: bool) -> FilterResult<HeadersStatus> {
        Ok(HeadersStatus::Continue(headers))
    }

    fn on_data(&mut self, data: Bytes, _end_stream: bool) -> FilterResult<DataStatus> {
        Ok(DataStatus::Continue(data))
    }

    fn on_trailers(&mut self, trailers: HeaderMap) -> FilterResult<TrailersStatus> {
        Ok(TrailersStatus::Continue(trailers))
    }

    /// Called once when the stream failed, after which no callback follows.
    fn on_error(&mut self, _error: &StreamError) {}

    /// Called once when the stream was cancelled, after which no callback follows.
    fn on_cancel(&mut self) {}
}

impl<F: Filter + ?Sized> Filter for Box<F> {
    #[inline]
    fn on_headers(&mut self, headers: HeaderMap, end_stream: bool) -> FilterResult<HeadersStatus> {
        (**self).on_headers(headers, end_stream)
    }

    #[inline]
    fn on_data(&mut self, data: Bytes, end_stream: bool) -> FilterResult<DataStatus> {
        (**self).on_data(data, end_stream)
    }

    #[inline]
    fn on_trailers(&mut self, trailers: HeaderMap) -> FilterResult<TrailersStatus> {
        (**self).on_trailers(trailers)
    }

    #[inline]
    fn on_error(&mut self, error: &StreamError) {
        (**self).on_error(error);
    }

    #[inline]
    fn on_cancel(&mut self) {
        (**self).on_cancel();
    }
}

/// A filter that passes everything through.
#[derive(Debug, Default, Copy, Clone)]
pub struct PassThrough;

impl Filter for PassThrough {}

pub fn pass_through() -> PassThrough {
    PassThrough
}

/// Creates a fresh filter for every stream.
///
/// Any `Fn() -> impl Filter` closure is a factory:
///
/// ```
/// use micro_filter::filter::{FilterFactory, PassThrough};
///
/// fn accepts<F: FilterFactory>(_factory: F) {}
///
/// accepts(|| PassThrough);
/// ```
pub trait FilterFactory: Send + Sync {
    fn create(&self) -> Box<dyn Filter>;
}

impl<F, R> FilterFactory for F
where
    F: Fn() -> R + Send + Sync,
    R: Filter + 'static,
{
    fn create(&self) -> Box<dyn Filter> {
        Box::new((self)())
    }
}
