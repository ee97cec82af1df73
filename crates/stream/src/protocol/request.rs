//! Request snapshot consumed at stream start.
//!
//! A [`Request`] is built once through [`RequestBuilder`] and then frozen. The
//! stream turns it into its first header frame with [`Request::outbound_headers`],
//! followed by the optional body and trailers.

use bytes::Bytes;
use http::{Method, Uri};

use crate::protocol::{HeaderMap, HeaderMapBuilder};

/// Opaque retry configuration attached to a request.
///
/// The pipeline never interprets it: its header bundle is appended to the outbound
/// headers and the transport acts on it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    headers: HeaderMap,
}

impl RetryPolicy {
    pub fn from_headers(headers: HeaderMap) -> Self {
        Self { headers }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// An immutable request description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    trailers: HeaderMap,
    body: Option<Bytes>,
    retry_policy: Option<RetryPolicy>,
}

impl Request {
    pub fn builder(method: Method, uri: Uri) -> RequestBuilder {
        RequestBuilder::new(method, uri)
    }

    /// Re-enters a builder seeded with this request.
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.to_builder(),
            trailers: self.trailers.to_builder(),
            body: self.body.clone(),
            retry_policy: self.retry_policy.clone(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn trailers(&self) -> &HeaderMap {
        &self.trailers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    /// Builds the header block sent when the stream starts.
    ///
    /// Pseudo headers come first (`:method`, `:scheme`, `:authority`, `:path`),
    /// then the request headers, then the retry policy's headers which replace
    /// any request header of the same name.
    pub fn outbound_headers(&self) -> HeaderMap {
        let mut builder = HeaderMapBuilder::new()
            .add(":method", self.method.as_str())
            .add(":scheme", self.uri.scheme_str().unwrap_or("https"));

        if let Some(authority) = self.uri.authority() {
            builder = builder.add(":authority", authority.as_str());
        }

        builder = builder.add(":path", self.uri.path_and_query().map_or("/", |path| path.as_str()));

        for (name, values) in self.headers.iter() {
            builder = values.iter().fold(builder, |builder, value| builder.add(name, value.as_str()));
        }

        if let Some(retry_policy) = &self.retry_policy {
            for (name, values) in retry_policy.headers().iter() {
                builder = builder.set(name, values.iter().map(String::as_str));
            }
        }

        builder.build()
    }
}

/// Mutable staging area for a [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    uri: Uri,
    headers: HeaderMapBuilder,
    trailers: HeaderMapBuilder,
    body: Option<Bytes>,
    retry_policy: Option<RetryPolicy>,
}

impl RequestBuilder {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMapBuilder::new(),
            trailers: HeaderMapBuilder::new(),
            body: None,
            retry_policy: None,
        }
    }

    pub fn add_header<V: Into<String>>(mut self, name: &str, value: V) -> Self {
        self.headers = self.headers.add(name, value);
        self
    }

    pub fn remove_headers(mut self, name: &str) -> Self {
        self.headers = self.headers.remove(name);
        self
    }

    pub fn remove_header(mut self, name: &str, value: &str) -> Self {
        self.headers = self.headers.remove_value(name, value);
        self
    }

    pub fn add_trailer<V: Into<String>>(mut self, name: &str, value: V) -> Self {
        self.trailers = self.trailers.add(name, value);
        self
    }

    pub fn remove_trailers(mut self, name: &str) -> Self {
        self.trailers = self.trailers.remove(name);
        self
    }

    pub fn remove_trailer(mut self, name: &str, value: &str) -> Self {
        self.trailers = self.trailers.remove_value(name, value);
        self
    }

    pub fn body<B: Into<Bytes>>(mut self, body: Option<B>) -> Self {
        self.body = body.map(Into::into);
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method,
            uri: self.uri,
            headers: self.headers.build(),
            trailers: self.trailers.build(),
            body: self.body,
            retry_policy: self.retry_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request::builder(Method::POST, Uri::from_static("https://example.com/api/v1?debug=1"))
            .add_header("X-Trace", "a")
            .add_header("x-trace", "b")
            .add_header("x-retry-on", "never")
            .add_trailer("grpc-status", "0")
            .body(Some("hello"))
            .retry_policy(RetryPolicy::from_headers(HeaderMap::builder().add("x-retry-on", "5xx").build()))
            .build()
    }

    #[test]
    fn outbound_headers_start_with_pseudo_headers() {
        let headers = request().outbound_headers();

        let names = headers.names().collect::<Vec<_>>();
        assert_eq!(&names[..4], &[":method", ":scheme", ":authority", ":path"]);

        assert_eq!(headers.value(":method"), Some(&["POST".to_string()][..]));
        assert_eq!(headers.value(":scheme"), Some(&["https".to_string()][..]));
        assert_eq!(headers.value(":authority"), Some(&["example.com".to_string()][..]));
        assert_eq!(headers.value(":path"), Some(&["/api/v1?debug=1".to_string()][..]));
        assert_eq!(headers.value("x-trace"), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(headers.value("x-retry-on"), Some(&["5xx".to_string()][..]));
    }

    #[test]
    fn relative_uri_falls_back_to_defaults() {
        let headers = Request::builder(Method::GET, Uri::from_static("/")).build().outbound_headers();

        assert_eq!(headers.value(":scheme"), Some(&["https".to_string()][..]));
        assert!(!headers.contains(":authority"));
        assert_eq!(headers.value(":path"), Some(&["/".to_string()][..]));
    }

    #[test]
    fn to_builder_does_not_touch_the_snapshot() {
        let original = request();
        let edited = original.to_builder().remove_header("x-trace", "a").remove_trailers("grpc-status").body(None::<Bytes>).build();

        assert_eq!(original.headers().value("x-trace").map(<[String]>::len), Some(2));
        assert_eq!(edited.headers().value("x-trace"), Some(&["b".to_string()][..]));
        assert!(edited.trailers().is_empty());
        assert!(edited.body().is_none());
        assert_eq!(original.body(), Some(&Bytes::from_static(b"hello")));
    }
}
