use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{FutureExt, Stream, StreamExt};
use tracing::trace;

use crate::protocol::{HeaderMap, TransportError};
use crate::transport::Transport;

/// Creates an in-memory transport and the receiving end of its events.
///
/// The channel is closed once the outbound side ends (end-of-stream data or
/// headers, trailers) or the stream is cancelled, so an async consumer looping over
/// [`TransportEvents`] terminates with the stream. Sending after the receiver was
/// dropped fails with [`TransportError::Closed`].
pub fn channel() -> (ChannelTransport, TransportEvents) {
    let (sender, receiver) = mpsc::unbounded();
    (ChannelTransport { sender }, TransportEvents { receiver })
}

/// One operation recorded by a [`ChannelTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Headers { headers: HeaderMap, end_stream: bool },
    Data { data: Bytes, end_stream: bool },
    Metadata(HeaderMap),
    Trailers(HeaderMap),
    Cancel,
}

impl TransportEvent {
    #[inline]
    fn ends_stream(&self) -> bool {
        match self {
            TransportEvent::Headers { end_stream, .. } | TransportEvent::Data { end_stream, .. } => *end_stream,
            TransportEvent::Metadata(_) => false,
            TransportEvent::Trailers(_) | TransportEvent::Cancel => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<TransportEvent>,
}

impl ChannelTransport {
    fn push(&self, event: TransportEvent) -> Result<(), TransportError> {
        let ends_stream = event.ends_stream();
        trace!(?event, "transport event");
        self.sender.unbounded_send(event).map_err(|_e| TransportError::Closed)?;
        if ends_stream {
            self.sender.close_channel();
        }
        Ok(())
    }
}

impl Transport for ChannelTransport {
    fn send_headers(&self, headers: &HeaderMap, end_stream: bool) -> Result<(), TransportError> {
        self.push(TransportEvent::Headers { headers: headers.clone(), end_stream })
    }

    fn send_data(&self, data: Bytes, end_stream: bool) -> Result<(), TransportError> {
        self.push(TransportEvent::Data { data, end_stream })
    }

    fn send_metadata(&self, metadata: &HeaderMap) -> Result<(), TransportError> {
        self.push(TransportEvent::Metadata(metadata.clone()))
    }

    fn send_trailers(&self, trailers: &HeaderMap) -> Result<(), TransportError> {
        self.push(TransportEvent::Trailers(trailers.clone()))
    }

    fn cancel(&self) -> Result<(), TransportError> {
        self.push(TransportEvent::Cancel)
    }
}

/// Receiving end of a [`ChannelTransport`].
#[derive(Debug)]
pub struct TransportEvents {
    receiver: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportEvents {
    /// Returns the next event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<TransportEvent> {
        self.receiver.next().now_or_never().flatten()
    }

    /// Returns every event queued so far.
    pub fn drain(&mut self) -> Vec<TransportEvent> {
        std::iter::from_fn(|| self.try_next_event()).collect()
    }
}

impl Stream for TransportEvents {
    type Item = TransportEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_next_unpin(cx)
    }
}
