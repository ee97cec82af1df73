//! Filter chains for the micro stream pipeline
//!
//! This crate runs ordered chains of filters over the headers, data and trailers of a
//! stream, in both the request and the response direction. A filter may pass payload
//! on (possibly modified), stop iteration to hold it back, and resume iteration later,
//! either through the status of a later callback or from the outside.
//!
//! # Example
//!
//! ```
//! use micro_filter::client::StreamClient;
//! use micro_filter::filter::{Filter, FilterResult};
//! use micro_filter::status::HeadersStatus;
//! use micro_stream::protocol::HeaderMap;
//! use micro_stream::transport::{self, TransportEvent};
//!
//! /// Holds the request until somebody calls `continue_request`.
//! struct Gate;
//!
//! impl Filter for Gate {
//!     fn on_headers(&mut self, _headers: HeaderMap, _end_stream: bool) -> FilterResult<HeadersStatus> {
//!         Ok(HeadersStatus::StopIteration)
//!     }
//! }
//!
//! let client = StreamClient::builder().add_request_filter(|| Gate).build();
//! let (transport, mut events) = transport::channel();
//! let stream = client.start(transport, ());
//!
//! stream.send_headers(HeaderMap::builder().add(":method", "GET").build(), true)?;
//! assert!(events.try_next_event().is_none());
//!
//! stream.continue_request()?;
//! assert!(matches!(events.try_next_event(), Some(TransportEvent::Headers { end_stream: true, .. })));
//! # Ok::<(), micro_stream::protocol::StreamError>(())
//! ```
//!
//! # Architecture
//!
//! - [`status`]: What a filter callback returns for each phase
//! - [`filter`]: The [`filter::Filter`] trait and per stream filter factories
//! - [`record`]: Per filter, per phase progress used to validate resumes
//! - [`chain`]: [`chain::FilterChain`], the iteration engine of one direction
//! - [`client`]: [`client::StreamClient`] and [`client::HttpStream`], which bind both
//!   chains to an emitter and to application callbacks
//!
//! # Iteration
//!
//! Filters see a phase in the order they were added. When a filter stops, the payload
//! it was called with is parked at it. Later phases still reach the stopped filter,
//! but no filter after it, until iteration resumes:
//!
//! - the stopped filter returns `Continue` from a later callback, which forwards the
//!   parked payload first
//! - it returns `ResumeIteration`, optionally replacing the parked payload
//! - the owner calls `continue_request()`/`continue_response()`
//!
//! A filter error aborts the stream: the transport is cancelled and the application
//! receives one `on_error`.

pub mod chain;
pub mod client;
pub mod filter;
pub mod record;
pub mod status;

#[cfg(test)]
mod test_util;
