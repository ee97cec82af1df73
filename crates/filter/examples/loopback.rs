use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::StreamExt;
use http::{Method, Uri};
use micro_filter::client::{StreamCallbacks, StreamClient};
use micro_filter::filter::{Filter, FilterResult};
use micro_filter::status::{DataStatus, HeadersStatus};
use micro_stream::protocol::{HeaderMap, Request, StreamError};
use micro_stream::transport::{self, TransportEvent};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Tags every request with an id.
struct RequestId(u64);

impl Filter for RequestId {
    fn on_headers(&mut self, headers: HeaderMap, _end_stream: bool) -> FilterResult<HeadersStatus> {
        Ok(HeadersStatus::Continue(headers.to_builder().add("x-request-id", self.0.to_string()).build()))
    }
}

/// Releases the response body in one piece.
struct Aggregate;

impl Filter for Aggregate {
    fn on_data(&mut self, data: Bytes, end_stream: bool) -> FilterResult<DataStatus> {
        if end_stream { Ok(DataStatus::Continue(data)) } else { Ok(DataStatus::StopIterationAndBuffer) }
    }
}

struct PrintResponse;

impl StreamCallbacks for PrintResponse {
    fn on_headers(&mut self, headers: HeaderMap, end_stream: bool) {
        info!(?headers, end_stream, "response headers");
    }

    fn on_data(&mut self, data: Bytes, end_stream: bool) {
        info!(body = %String::from_utf8_lossy(&data), end_stream, "response body");
    }

    fn on_complete(&mut self) {
        info!("response complete");
    }

    fn on_error(&mut self, error: &StreamError) {
        error!(cause = %error, "stream failed");
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let ids = Arc::new(AtomicU64::new(1));
    let client = StreamClient::builder()
        .add_request_filter(move || RequestId(ids.fetch_add(1, Ordering::Relaxed)))
        .add_response_filter(|| Aggregate)
        .build();

    let (transport, mut events) = transport::channel();
    let stream = client.start(transport, PrintResponse);

    // plays the remote peer: everything sent comes back as the response
    let peer = stream.clone();
    let loopback = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            info!(?event, "transport received");
            let result = match event {
                TransportEvent::Headers { end_stream, .. } => {
                    peer.on_headers(HeaderMap::builder().add(":status", "200").build(), end_stream)
                }
                TransportEvent::Data { data, end_stream } => peer.on_data(data, end_stream),
                TransportEvent::Trailers(trailers) => peer.on_trailers(trailers),
                TransportEvent::Metadata(_) => Ok(()),
                TransportEvent::Cancel => {
                    peer.on_cancel();
                    Ok(())
                }
            };

            if let Err(e) = result {
                error!(cause = %e, "failed to deliver response");
            }
        }
    });

    let request = Request::builder(Method::POST, Uri::from_static("https://example.com/echo"))
        .add_header("content-type", "text/plain")
        .build();

    let sent = stream
        .send_headers(request.outbound_headers(), false)
        .and_then(|()| stream.send_data(Bytes::from_static(b"hello "), false))
        .and_then(|()| stream.send_data(Bytes::from_static(b"loopback"), true));
    if let Err(e) = sent {
        error!(cause = %e, "failed to send request");
        let _ = stream.cancel();
    }

    if let Err(e) = loopback.await {
        error!(cause = %e, "loopback task failed");
    }
}
