use std::sync::Arc;

use bytes::Bytes;
use micro_stream::protocol::{HeaderMap, StreamError};
use parking_lot::Mutex;

use crate::filter::{Filter, FilterResult};
use crate::status::{DataStatus, HeadersStatus, TrailersStatus};

/// Shared, ordered record of filter and callback invocations.
#[derive(Debug, Default, Clone)]
pub(crate) struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub(crate) fn push<S: Into<String>>(&self, entry: S) {
        self.0.lock().push(entry.into());
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}

type OnHeaders = Box<dyn FnMut(HeaderMap, bool) -> FilterResult<HeadersStatus> + Send>;
type OnData = Box<dyn FnMut(Bytes, bool) -> FilterResult<DataStatus> + Send>;
type OnTrailers = Box<dyn FnMut(HeaderMap) -> FilterResult<TrailersStatus> + Send>;

/// A filter that logs every callback as `name:phase` and answers with scripted statuses.
pub(crate) struct Probe {
    name: &'static str,
    log: Log,
    on_headers: Option<OnHeaders>,
    on_data: Option<OnData>,
    on_trailers: Option<OnTrailers>,
}

impl Probe {
    pub(crate) fn new(name: &'static str, log: &Log) -> Self {
        Self { name, log: log.clone(), on_headers: None, on_data: None, on_trailers: None }
    }

    pub(crate) fn headers<F>(mut self, f: F) -> Self
    where
        F: FnMut(HeaderMap, bool) -> FilterResult<HeadersStatus> + Send + 'static,
    {
        self.on_headers = Some(Box::new(f));
        self
    }

    pub(crate) fn data<F>(mut self, f: F) -> Self
    where
        F: FnMut(Bytes, bool) -> FilterResult<DataStatus> + Send + 'static,
    {
        self.on_data = Some(Box::new(f));
        self
    }

    pub(crate) fn trailers<F>(mut self, f: F) -> Self
    where
        F: FnMut(HeaderMap) -> FilterResult<TrailersStatus> + Send + 'static,
    {
        self.on_trailers = Some(Box::new(f));
        self
    }
}

impl Filter for Probe {
    fn on_headers(&mut self, headers: HeaderMap, end_stream: bool) -> FilterResult<HeadersStatus> {
        self.log.push(format!("{}:headers", self.name));
        match &mut self.on_headers {
            Some(f) => f(headers, end_stream),
            None => Ok(HeadersStatus::Continue(headers)),
        }
    }

    fn on_data(&mut self, data: Bytes, end_stream: bool) -> FilterResult<DataStatus> {
        self.log.push(format!("{}:data:{}", self.name, String::from_utf8_lossy(&data)));
        match &mut self.on_data {
            Some(f) => f(data, end_stream),
            None => Ok(DataStatus::Continue(data)),
        }
    }

    fn on_trailers(&mut self, trailers: HeaderMap) -> FilterResult<TrailersStatus> {
        self.log.push(format!("{}:trailers", self.name));
        match &mut self.on_trailers {
            Some(f) => f(trailers),
            None => Ok(TrailersStatus::Continue(trailers)),
        }
    }

    fn on_error(&mut self, _error: &StreamError) {
        self.log.push(format!("{}:error", self.name));
    }

    fn on_cancel(&mut self) {
        self.log.push(format!("{}:cancel", self.name));
    }
}
