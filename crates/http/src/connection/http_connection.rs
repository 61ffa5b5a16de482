use std::fmt::Display;
use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;

use futures::{SinkExt, StreamExt};
use http::header::EXPECT;
use http::{Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Empty};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info, trace, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::config::ServerConfig;
use crate::context::ServiceContext;
use crate::handler::Handler;
use crate::protocol::{
    AbortCause, HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError,
};
use crate::stream::{Affinity, InboundTraffic, NON_MULTIPLEXED_STREAM_ID, RequestStream, ResponseHandle};

/// An HTTP/1.1 connection, from accepted socket to the last keep-alive
/// exchange.
///
/// For every decoded request head the connection builds a [`RequestStream`],
/// binds a fresh [`ServiceContext`] to it, and then drives two things
/// concurrently on its own task: the handler consuming the request, and the
/// inbound pump admitting body chunks into the stream. The pump consults the
/// connection's [`InboundTraffic`] accountant before every read, which is how
/// slow handlers push back on fast peers.
///
/// Everything a connection owns is task-affine; drive it with
/// `tokio::task::spawn_local` (or a current-thread runtime), not `tokio::spawn`.
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    config: ServerConfig,
    traffic: InboundTraffic,
    next_request_id: u32,
}

/// What the inbound pump last observed for the request in flight.
enum Inbound {
    /// Body still streaming in
    Reading,
    /// The end-of-stream marker was admitted
    BodyDone,
    /// The body crossed the length limit and the request side was closed
    OverLimit,
    /// The peer closed the connection mid-request
    PeerClosed,
    /// The wire produced garbage; the connection cannot be trusted anymore
    Failed(ParseError),
}

/// Whether the connection can serve another exchange.
enum Outcome {
    KeepAlive,
    Shutdown,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, ServerConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: ServerConfig) -> Self {
        let traffic = InboundTraffic::new(config.high_watermark, config.low_watermark);
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), config.read_buffer_size),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            config,
            traffic,
            next_request_id: 0,
        }
    }

    /// Serves requests off this connection until it is closed by either side
    /// or fails.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let affinity = Affinity::current();
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    match self.do_process(&affinity, header, payload_size, &handler).await? {
                        Outcome::KeepAlive => continue,
                        Outcome::Shutdown => return Ok(()),
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("received body payload while expecting a request head");
                    let error_response = build_error_response(StatusCode::BAD_REQUEST);
                    self.do_send_response(error_response).await?;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) => {
                    error!("can't receive next request, cause {}", e);
                    let error_response = build_error_response(StatusCode::BAD_REQUEST);
                    self.do_send_response(error_response).await?;
                    return Err(e.into());
                }

                None => {
                    info!("no more requests, connection shutdown");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(
        &mut self,
        affinity: &Affinity,
        header: RequestHeader,
        payload_size: PayloadSize,
        handler: &Arc<H>,
    ) -> Result<Outcome, HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        self.handle_expect_continue(&header).await?;

        self.next_request_id = self.next_request_id.wrapping_add(1);
        let keep_alive = header.is_keep_alive();
        let mut stream = RequestStream::new(
            affinity.clone(),
            self.next_request_id,
            NON_MULTIPLEXED_STREAM_ID,
            header,
            payload_size,
            keep_alive,
            self.traffic.clone(),
            self.config.max_request_length,
        );

        // in a full framework the context would be produced by routing; here
        // it carries the connection-level policy
        let ctx = Rc::new(ServiceContext::new(self.config.max_request_length));
        stream.init(Rc::clone(&ctx));

        // a body announced over the limit is refused before a byte of it is
        // admitted
        if let PayloadSize::Length(length) = payload_size
            && length > stream.max_request_length()
        {
            warn!(
                request_id = stream.id(),
                length,
                limit = stream.max_request_length(),
                "announced request body over the limit"
            );
            stream.close(AbortCause::ContentTooLarge { limit: stream.max_request_length() });
            self.respond(&mut stream, build_error_response(StatusCode::PAYLOAD_TOO_LARGE)).await?;
            return Ok(Outcome::Shutdown);
        }

        let request = stream.take_request();

        // Drive the handler and the inbound pump concurrently: the handler may
        // be waiting for body data only the pump can admit, and the pump may
        // be waiting for buffer space only the handler can free.
        let mut inbound = Inbound::Reading;
        let response_result = {
            tokio::pin! {
                let handle_future = handler.call(request);
            }

            loop {
                select! {
                    // biased ensures the finished handler wins over more body
                    biased;
                    response = &mut handle_future => break response,
                    state = Self::pump_inbound(&mut self.framed_read, &mut stream, &self.traffic),
                        if matches!(inbound, Inbound::Reading) =>
                    {
                        inbound = state;
                    }
                }
            }
        };

        let body_done = matches!(inbound, Inbound::BodyDone);
        match inbound {
            Inbound::Failed(e) => Err(e.into()),

            Inbound::PeerClosed => Err(AbortCause::ConnectionClosed.into()),

            Inbound::OverLimit => {
                self.respond(&mut stream, build_error_response(StatusCode::PAYLOAD_TOO_LARGE)).await?;
                Ok(Outcome::Shutdown)
            }

            Inbound::Reading | Inbound::BodyDone => {
                // whatever the handler left on the wire must be consumed
                // before this connection can carry another head
                if !body_done {
                    self.drain_inbound(&mut stream).await?;
                }

                let delivered = match response_result {
                    Ok(response) => self.respond(&mut stream, response).await?,
                    Err(e) => {
                        let cause: Box<dyn std::error::Error + Send + Sync> = e.into();
                        error!("handler failed, cause: {cause}");
                        self.respond(&mut stream, build_error_response(StatusCode::INTERNAL_SERVER_ERROR)).await?
                    }
                };

                // flush unread leftovers out of the pending buffer so the
                // traffic accounting settles to zero
                let _ = stream.close(AbortCause::Discarded);
                log_exchange(&stream, &ctx);

                if delivered && stream.is_keep_alive() { Ok(Outcome::KeepAlive) } else { Ok(Outcome::Shutdown) }
            }
        }
    }

    /// One pump step: wait until reading is allowed, read one decoded item,
    /// admit it into the stream.
    async fn pump_inbound(
        framed_read: &mut FramedRead<R, RequestDecoder>,
        stream: &mut RequestStream,
        traffic: &InboundTraffic,
    ) -> Inbound {
        traffic.resumed().await;

        match framed_read.next().await {
            Some(Ok(Message::Payload(item))) => {
                let is_eof = item.is_eof();
                let admitted = stream.publish(item);
                if admitted && stream.transferred_bytes() > stream.max_request_length() {
                    let limit = stream.max_request_length();
                    warn!(
                        request_id = stream.id(),
                        transferred = stream.transferred_bytes(),
                        limit,
                        "request body over the limit"
                    );
                    stream.close(AbortCause::ContentTooLarge { limit });
                    return Inbound::OverLimit;
                }
                if is_eof { Inbound::BodyDone } else { Inbound::Reading }
            }

            Some(Ok(Message::Header(_))) => {
                error!("received a request head in the payload phase");
                stream.abort_response(AbortCause::PeerReset);
                Inbound::Failed(ParseError::invalid_body("received header in payload phase"))
            }

            Some(Err(e)) => {
                error!("failed to read request body, cause {}", e);
                stream.abort_response(AbortCause::PeerReset);
                Inbound::Failed(e)
            }

            None => {
                stream.abort_response(AbortCause::ConnectionClosed);
                Inbound::PeerClosed
            }
        }
    }

    /// Reads and discards the remainder of the in-flight body so the next
    /// head starts on a clean wire.
    async fn drain_inbound(&mut self, stream: &mut RequestStream) -> Result<(), HttpError> {
        let mut skipped: usize = 0;
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Payload(item))) => {
                    if item.is_eof() {
                        if skipped > 0 {
                            info!(size = skipped, "skipped unread request body");
                        }
                        return Ok(());
                    }
                    if let Some(bytes) = item.as_bytes() {
                        skipped += bytes.len();
                    }
                }

                Some(Ok(Message::Header(_))) => {
                    error!("received a request head while draining the body");
                    return Err(ParseError::invalid_body("received header while draining body").into());
                }

                Some(Err(e)) => return Err(e.into()),

                None => {
                    stream.abort_response(AbortCause::ConnectionClosed);
                    return Err(AbortCause::ConnectionClosed.into());
                }
            }
        }
    }

    /// Binds a response handle to the stream and, unless the exchange was
    /// aborted in the meantime, writes the response. Returns whether the
    /// response was delivered.
    async fn respond<T>(&mut self, stream: &mut RequestStream, response: Response<T>) -> Result<bool, HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
    {
        let handle = ResponseHandle::new();
        stream.set_response(handle.clone());
        if let Some(cause) = handle.abort_cause() {
            info!(request_id = stream.id(), %cause, "response neutralized before delivery");
            return Ok(false);
        }

        self.do_send_response(response).await?;
        handle.complete();
        Ok(true)
    }

    async fn handle_expect_continue(&mut self, header: &RequestHeader) -> Result<(), HttpError> {
        if let Some(value) = header.headers().get(EXPECT) {
            let slice = value.as_bytes();
            if slice.len() >= 4 && &slice[0..4] == b"100-" {
                let writer = self.framed_write.get_mut();
                writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
                writer.flush().await.map_err(SendError::io)?;
                info!("received expect request header, sent continue response");
            }
        }
        Ok(())
    }

    async fn do_send_response<T>(&mut self, response: Response<T>) -> Result<(), HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
    {
        let (header_parts, mut body) = response.into_parts();

        let payload_size = {
            let size_hint = body.size_hint();
            match size_hint.exact() {
                Some(0) => PayloadSize::Empty,
                Some(length) => PayloadSize::Length(length),
                None => PayloadSize::Chunked,
            }
        };

        let head = Message::<_, T::Data>::Header((ResponseHead::from_parts(header_parts, ()), payload_size));
        if payload_size.is_empty() {
            // nothing else will be written, flush the head now
            self.framed_write.send(head).await?;
        } else {
            self.framed_write.feed(head).await?;
        }

        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    let payload_item = frame
                        .into_data()
                        .map(PayloadItem::Chunk)
                        .map_err(|_| SendError::invalid_body("response trailers are not supported"))?;
                    self.framed_write.send(Message::Payload(payload_item)).await?;
                }

                Some(Err(e)) => return Err(SendError::invalid_body(format!("response body failed: {e}")).into()),

                None => {
                    self.framed_write.send(Message::Payload(PayloadItem::<T::Data>::Eof)).await?;
                    return Ok(());
                }
            }
        }
    }
}

fn log_exchange(stream: &RequestStream, ctx: &ServiceContext) {
    let elapsed = ctx.log().first_bytes_transferred_at().map(|at| at.elapsed());
    trace!(
        request_id = stream.id(),
        method = ?ctx.log().method(),
        path = ?ctx.log().path(),
        transferred = stream.transferred_bytes(),
        elapsed = ?elapsed,
        "exchange complete"
    );
}

fn build_error_response(status_code: StatusCode) -> Response<Empty<Bytes>> {
    Response::builder().status(status_code).body(Empty::new()).unwrap()
}
