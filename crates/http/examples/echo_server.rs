//! A small echo server.
//!
//! ```bash
//! cargo run --example echo_server
//! curl -d 'hello' http://127.0.0.1:8080/
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use tokio::net::TcpListener;
use tokio::task::LocalSet;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use inlet_http::connection::HttpConnection;
use inlet_http::handler::make_handler;
use inlet_http::protocol::body::ReqBody;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let handler = Arc::new(make_handler(echo));
    let local = LocalSet::new();

    local
        .run_until(async {
            loop {
                let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                };
                info!(%remote_addr, "accepted connection");

                let handler = Arc::clone(&handler);
                tokio::task::spawn_local(async move {
                    let (reader, writer) = tcp_stream.into_split();
                    let connection = HttpConnection::new(reader, writer);
                    match connection.process(handler).await {
                        Ok(()) => info!("finished process, connection shutdown"),
                        Err(e) => error!("service has error, cause {}, connection shutdown", e),
                    }
                });
            }
        })
        .await;
}

async fn echo(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
    let (_header, body) = request.into_parts();
    let body_bytes = body.collect().await.map(|collected| collected.to_bytes()).unwrap_or_default();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_LENGTH, body_bytes.len())
        .body(Full::new(body_bytes))
        .unwrap();

    Ok(response)
}
