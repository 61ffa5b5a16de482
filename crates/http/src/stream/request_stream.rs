use std::cell::RefCell;
use std::rc::Rc;

use http::Request;

use crate::context::ServiceContext;
use crate::protocol::body::ReqBody;
use crate::protocol::{AbortCause, PayloadItem, PayloadSize, RequestHeader};
use crate::stream::channel::StreamChannel;
use crate::stream::response::ResponseHandle;
use crate::stream::{Affinity, InboundTraffic};

/// Stream id used for requests on a non-multiplexed (HTTP/1.x) connection.
pub const NON_MULTIPLEXED_STREAM_ID: u32 = 1;

/// Coordinates one in-flight request as its body is decoded off a connection.
///
/// A `RequestStream` is created by the decode pipeline as soon as the request
/// head is parsed, before a [`ServiceContext`] exists. It specializes the
/// [`StreamChannel`] primitive with byte accounting: every admitted body chunk
/// increments the connection's [`InboundTraffic`] accountant and the saturating
/// transferred-byte counter, and every chunk leaving the pending buffer
/// (consumed by the handler or discarded on close) decrements the accountant,
/// so the accountant always reflects bytes *currently buffered*.
///
/// It also owns the response side of the exchange: a [`ResponseHandle`] bound
/// through [`set_response`](Self::set_response) and the tie-break in
/// [`abort_response`](Self::abort_response) that decides, when request and
/// response can fail independently, whether closing the request or aborting
/// the response wins.
///
/// All methods must run on the connection's own task; an [`Affinity`] captured
/// at construction asserts this in debug builds. No field is guarded by a
/// lock.
pub struct RequestStream {
    affinity: Affinity,
    id: u32,
    stream_id: u32,
    keep_alive: bool,
    header: Option<RequestHeader>,
    payload_size: PayloadSize,
    traffic: InboundTraffic,
    default_max_request_length: u64,
    channel: Rc<RefCell<StreamChannel>>,
    ctx: Option<Rc<ServiceContext>>,
    transferred_bytes: u64,
    response: Option<ResponseHandle>,
    response_aborted: Option<AbortCause>,
}

impl RequestStream {
    /// Creates the stream for one decoded request head.
    ///
    /// `id` is the connection-scoped request id, never reused while the
    /// connection lives; `stream_id` is the protocol-level stream id
    /// ([`NON_MULTIPLEXED_STREAM_ID`] on HTTP/1.x). `default_max_request_length`
    /// applies until a context is bound via [`init`](Self::init).
    #[allow(clippy::too_many_arguments, reason = "construction mirrors the decode pipeline's inputs")]
    pub fn new(
        affinity: Affinity,
        id: u32,
        stream_id: u32,
        header: RequestHeader,
        payload_size: PayloadSize,
        keep_alive: bool,
        traffic: InboundTraffic,
        default_max_request_length: u64,
    ) -> Self {
        let removal_traffic = traffic.clone();
        let channel = StreamChannel::new(move |item: &PayloadItem| {
            if let Some(len) = item.data_len() {
                removal_traffic.decrement(len);
            }
        });

        Self {
            affinity,
            id,
            stream_id,
            keep_alive,
            header: Some(header),
            payload_size,
            traffic,
            default_max_request_length,
            channel: Rc::new(RefCell::new(channel)),
            ctx: None,
            transferred_bytes: 0,
            response: None,
            response_aborted: None,
        }
    }

    /// Binds the request context. Must be called exactly once, before any body
    /// chunk is admitted.
    ///
    /// Forwards the decoded headers into the context's log sink and stamps the
    /// first-byte instant. The head was parsed some time before the context
    /// could be created, so the stamp lags the actual channel read slightly;
    /// it is the best observation point available.
    pub fn init(&mut self, ctx: Rc<ServiceContext>) {
        self.affinity.check();
        if let Some(header) = &self.header {
            ctx.log().request_headers(header);
        }
        ctx.log().request_first_bytes_transferred();
        self.ctx = Some(ctx);
    }

    /// The execution context this stream and any consumer of its body belong
    /// to.
    pub fn affinity(&self) -> &Affinity {
        &self.affinity
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    /// Whether to keep the connection alive after this exchange completes.
    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// The effective request body limit: the bound context's limit if a
    /// context is bound, the connection-level default otherwise.
    pub fn max_request_length(&self) -> u64 {
        self.ctx.as_ref().map_or(self.default_max_request_length, |ctx| ctx.max_request_length())
    }

    /// Cumulative body bytes admitted so far. Saturates at `u64::MAX` instead
    /// of wrapping.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }

    /// Consumes the stored head, returning the request to hand to a handler.
    /// Its body is the consumer half of this stream.
    ///
    /// # Panics
    ///
    /// Panics when called more than once.
    pub fn take_request(&mut self) -> Request<ReqBody> {
        self.affinity.check();
        let header = self.header.take().expect("request already taken from this stream");
        header.body(ReqBody::new(Rc::clone(&self.channel), self.payload_size))
    }

    /// Attempts to admit one payload item into the stream.
    ///
    /// Returns whether the admission succeeded; `false` means the stream is
    /// already closed or complete, which is a normal rejection rather than an
    /// error. An admitted data chunk increments the traffic accountant,
    /// advances the transferred-byte counter and reports the new cumulative
    /// length to the bound context's log sink.
    ///
    /// # Panics
    ///
    /// A data chunk can only be admitted after [`init`](Self::init); an
    /// uninitialized stream must already be closed before data arrives, in
    /// which case admission is rejected above. Anything else is a bug in the
    /// decode pipeline's ordering and panics.
    pub fn publish(&mut self, item: PayloadItem) -> bool {
        self.affinity.check();
        let data_len = item.data_len();
        let admitted = self.channel.borrow_mut().publish(item);
        if admitted && let Some(len) = data_len {
            self.traffic.increment(len);
            self.transferred_bytes = self.transferred_bytes.saturating_add(len as u64);
            let ctx = self.ctx.as_ref().expect("body data admitted into an uninitialized request stream");
            ctx.log().request_length(self.transferred_bytes);
        }
        admitted
    }

    /// Closes the inbound side with `cause`, discarding pending items.
    ///
    /// Returns whether this call performed the open-to-closed transition.
    pub fn close(&mut self, cause: AbortCause) -> bool {
        self.affinity.check();
        self.channel.borrow_mut().close(cause)
    }

    /// Whether the inbound side reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.channel.borrow().is_complete()
    }

    /// Binds the response that answers this request.
    ///
    /// If the response side was already marked aborted, the late response is
    /// neutralized on the spot: aborted immediately unless it is already
    /// terminal, and never stored as the active response.
    pub fn set_response(&mut self, response: ResponseHandle) {
        self.affinity.check();
        match &self.response_aborted {
            Some(cause) => {
                if !response.is_complete() {
                    response.abort(cause.clone());
                }
            }
            None => self.response = Some(response),
        }
    }

    /// Marks the response side aborted and resolves who tears down what.
    ///
    /// Closing the request is attempted first. When the close happens here,
    /// the unwinding pipeline is expected to settle the response through the
    /// normal handler path, so the bound response is left untouched; an
    /// explicit abort as well would race that signal. When the request side
    /// was already closed by some other trigger, that unwind may never reach
    /// this response, so it is aborted directly.
    ///
    /// Safe to call repeatedly; the first cause wins.
    pub fn abort_response(&mut self, cause: AbortCause) {
        self.affinity.check();
        if self.response_aborted.is_none() {
            self.response_aborted = Some(cause.clone());
        }
        if !self.channel.borrow_mut().close(cause.clone())
            && let Some(response) = &self.response
            && !response.is_complete()
        {
            response.abort(cause);
        }
    }

    /// Whether the response side has been marked aborted.
    pub fn is_response_aborted(&self) -> bool {
        self.response_aborted.is_some()
    }
}

impl std::fmt::Debug for RequestStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestStream")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("keep_alive", &self.keep_alive)
            .field("transferred_bytes", &self.transferred_bytes)
            .field("response_aborted", &self.response_aborted)
            .finish()
    }
}
