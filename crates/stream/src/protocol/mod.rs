//! Core stream protocol abstractions.
//!
//! This module holds the value types that travel through a stream and the errors
//! every stream operation reports.
//!
//! # Architecture
//!
//! - **Payload** ([`header_map`], [`frame`]):
//!   - [`HeaderMap`]: Frozen name to values mapping used for headers, trailers and metadata
//!   - [`Frame`]: One unit of payload (headers, data chunk or trailers)
//!   - [`Phase`] and [`Direction`]: Where a frame sits in the stream and which way it travels
//!
//! - **Request Description** ([`request`]):
//!   - [`Request`]: Immutable snapshot consumed at stream start
//!   - [`RetryPolicy`]: Opaque retry configuration carried as headers
//!
//! - **Lifecycle** ([`StreamState`]): The emitter-owned state of a stream
//!
//! - **Error Handling**:
//!   - [`StreamError`]: Illegal state, transport and filter failures
//!   - [`TransportError`]: Failures reported by the transport collaborator
//!   - [`InvalidHeader`]: Header values that can not be represented

mod error;
pub use error::BoxError;
pub use error::InvalidHeader;
pub use error::StreamError;
pub use error::TransportError;

pub mod frame;
pub use frame::Direction;
pub use frame::Frame;
pub use frame::Phase;

pub mod header_map;
pub use header_map::HeaderMap;
pub use header_map::HeaderMapBuilder;

pub mod request;
pub use request::Request;
pub use request::RequestBuilder;
pub use request::RetryPolicy;

mod state;
pub(crate) use state::AtomicStreamState;
pub use state::StreamId;
pub use state::StreamState;
