//! Per-request inbound stream coordination.
//!
//! This module is the heart of the server's request path. For every decoded
//! request head the connection creates a [`RequestStream`], which:
//!
//! - specializes the flow-controlled [`StreamChannel`] primitive that carries
//!   body chunks from the decode pipeline to the handler,
//! - keeps byte accounting paired with the connection-wide [`InboundTraffic`]
//!   accountant (admit increments, removal decrements), which is what drives
//!   read backpressure,
//! - resolves the effective request length limit before and after a
//!   [`ServiceContext`](crate::context::ServiceContext) is bound,
//! - and owns the response binding and abort tie-break protocol around
//!   [`ResponseHandle`].
//!
//! Everything here is deliberately lock-free and task-affine: one connection
//! task owns its streams, and [`Affinity`] asserts that discipline in debug
//! builds.

mod affinity;
mod channel;
mod request_stream;
mod response;
mod traffic;

pub use affinity::Affinity;
pub use channel::StreamChannel;
pub use request_stream::{NON_MULTIPLEXED_STREAM_ID, RequestStream};
pub use response::ResponseHandle;
pub use traffic::{DEFAULT_HIGH_WATERMARK, DEFAULT_LOW_WATERMARK, InboundTraffic};
