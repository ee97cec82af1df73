//! Stream primitives for the micro stream pipeline
//!
//! This crate provides the pieces a single logical HTTP stream is made of, below
//! any filter processing: the payload value types, the seam to the transport that
//! performs network I/O, and the emitter that guards every outbound operation with
//! the stream's lifecycle state.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use micro_stream::emitter::StreamEmitter;
//! use micro_stream::protocol::{HeaderMap, StreamId};
//! use micro_stream::transport::{self, TransportEvent};
//!
//! let (transport, mut events) = transport::channel();
//! let emitter = StreamEmitter::new(StreamId::new(1), transport);
//!
//! let headers = HeaderMap::builder().add(":method", "GET").add(":path", "/").build();
//! emitter.send_headers(&headers, false).unwrap();
//! emitter.close(Some(&HeaderMap::builder().add("grpc-status", "0").build())).unwrap();
//!
//! // the send after close never reaches the transport
//! assert!(emitter.send_data(Bytes::from_static(b"late"), false).is_err());
//!
//! let recorded = events.drain();
//! assert_eq!(recorded.len(), 2);
//! assert!(matches!(recorded[1], TransportEvent::Trailers(_)));
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: Header maps, requests, frames, stream state and errors
//! - [`transport`]: The [`transport::Transport`] collaborator trait and an in-memory channel transport
//! - [`emitter`]: [`emitter::StreamEmitter`], the sole outbound channel of a stream
//! - [`stats`]: Counters recorded against a weakly held stats engine
//!
//! # Error Handling
//!
//! Every stream operation reports a [`protocol::StreamError`]:
//!
//! - `IllegalState`: a stream precondition was violated, detected before any I/O
//! - `Transport`: the transport failed, the stream is terminal afterwards
//! - `Filter`: a filter callback failed (produced by the filter chain crate)

pub mod emitter;
pub mod protocol;
pub mod stats;
pub mod transport;

mod utils;
