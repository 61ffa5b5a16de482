//! An asynchronous HTTP/1.1 server library built around per-request inbound
//! stream coordination.
//!
//! This crate provides a lightweight HTTP/1.1 server implementation on top of
//! tokio. Its distinguishing piece is the request path: every request body is
//! driven through a [`stream::RequestStream`], a per-request coordinator that
//! feeds a connection-wide backpressure counter while the handler consumes
//! the body, and that arbitrates between the request and response sides when
//! either fails.
//!
//! # Features
//!
//! - Full HTTP/1.1 protocol support with keep-alive and expect-continue
//! - Streaming request bodies with connection-wide read backpressure
//! - Request length limits, enforced before and during body transfer
//! - Deterministic request/response abort arbitration on resets and failures
//! - Zero-copy body chunks via `bytes`
//! - Structured logging via `tracing`
//!
//! # Example
//!
//! Connections are task-affine, so they are spawned on a `LocalSet` (or a
//! current-thread runtime) rather than with `tokio::spawn`:
//!
//! ```no_run
//! use http::{Request, Response, StatusCode};
//! use http_body_util::{BodyExt, Full};
//! use bytes::Bytes;
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::task::LocalSet;
//! use tracing::{error, info, warn, Level};
//! use tracing_subscriber::FmtSubscriber;
//! use inlet_http::connection::HttpConnection;
//! use inlet_http::handler::make_handler;
//! use inlet_http::protocol::body::ReqBody;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     info!(port = 8080, "start listening");
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!     let local = LocalSet::new();
//!
//!     local
//!         .run_until(async {
//!             loop {
//!                 let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!                     Ok(stream_and_addr) => stream_and_addr,
//!                     Err(e) => {
//!                         warn!(cause = %e, "failed to accept");
//!                         continue;
//!                     }
//!                 };
//!
//!                 let handler = Arc::clone(&handler);
//!                 tokio::task::spawn_local(async move {
//!                     let (reader, writer) = tcp_stream.into_split();
//!                     let connection = HttpConnection::new(reader, writer);
//!                     match connection.process(handler).await {
//!                         Ok(()) => info!("finished process, connection shutdown"),
//!                         Err(e) => error!("service has error, cause {}, connection shutdown", e),
//!                     }
//!                 });
//!             }
//!         })
//!         .await;
//! }
//!
//! async fn hello_world(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
//!     info!("request path {}", request.uri().path());
//!
//!     let (_header, body) = request.into_parts();
//!     let body_bytes = body.collect().await.map(|collected| collected.to_bytes()).unwrap_or_default();
//!     info!(len = body_bytes.len(), "received request body");
//!
//!     let response = Response::builder()
//!         .status(StatusCode::OK)
//!         .body(Full::new(Bytes::from_static(b"Hello World!\r\n")))
//!         .unwrap();
//!
//!     Ok(response)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: connection lifecycle, the inbound pump and response
//!   writing
//! - [`stream`]: the per-request stream coordinator, the flow-controlled
//!   channel primitive, the traffic accountant and the response handle
//! - [`protocol`]: message types, request/response heads, errors and the
//!   `http_body::Body` view of request bodies
//! - [`codec`]: HTTP/1.1 wire encoding and decoding
//! - [`context`]: per-request metadata and the request log sink
//! - [`handler`]: handler trait and async-fn adapter
//! - [`config`]: connection-level configuration
//!
//! # Backpressure
//!
//! Admitted body chunks are charged to a connection-wide
//! [`stream::InboundTraffic`] accountant and refunded when the handler
//! consumes them (or when they are discarded). The connection stops reading
//! off the transport while the accountant sits above its high watermark, so a
//! slow handler slows the peer down instead of growing buffers.
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only (no HTTP/2 or HTTP/3)
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Maximum header size: 8KB, maximum number of headers: 64

pub mod codec;
pub mod config;
pub mod connection;
pub mod context;
pub mod handler;
pub mod protocol;
pub mod stream;

mod utils;
pub(crate) use utils::ensure;
