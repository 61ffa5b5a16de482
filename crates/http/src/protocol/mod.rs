//! Core HTTP protocol types.
//!
//! The building blocks shared by the codec, the stream layer and the
//! connection driver:
//!
//! - [`Message`], [`PayloadItem`], [`PayloadSize`]: the wire-level items the
//!   decoder produces and the encoder consumes
//! - [`RequestHeader`] / [`ResponseHead`]: typed message heads
//! - [`body::ReqBody`]: the `http_body::Body` view of an in-flight request
//! - [`HttpError`], [`ParseError`], [`SendError`], [`AbortCause`]: the error
//!   taxonomy, with `AbortCause` as the clonable cause used by the stream
//!   close/abort protocol

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::AbortCause;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
