use std::collections::VecDeque;
use std::fmt;
use std::task::{Context, Poll, Waker};

use crate::protocol::{AbortCause, PayloadItem};

/// A flow-controlled, single-producer single-consumer stream of payload items.
///
/// The channel is the primitive the per-request stream specializes: the
/// decode pipeline publishes items into a pending buffer, the body consumer
/// polls them out, and a removal hook observes every item that leaves the
/// buffer, whether it was consumed or discarded by an abnormal close. The
/// hook is what lets the owner keep byte accounting paired: admit on
/// `publish`, settle on removal.
///
/// State machine: `Open` accepts publishes; `close(cause)` moves to `Closed`
/// and discards whatever is still pending; consuming the `Eof` item moves to
/// `Complete`. Both `Closed` and `Complete` are terminal.
///
/// Producer and consumer are expected to live on the same task, so no lock
/// guards the queue; the owner wraps the channel in `Rc<RefCell<_>>`.
pub struct StreamChannel {
    queue: VecDeque<PayloadItem>,
    state: State,
    on_removal: Box<dyn FnMut(&PayloadItem)>,
    waker: Option<Waker>,
}

enum State {
    Open,
    Closed(AbortCause),
    Complete,
}

impl StreamChannel {
    /// Creates a channel whose `on_removal` hook fires exactly once per item
    /// leaving the pending buffer.
    pub fn new(on_removal: impl FnMut(&PayloadItem) + 'static) -> Self {
        Self { queue: VecDeque::new(), state: State::Open, on_removal: Box::new(on_removal), waker: None }
    }

    /// Attempts to admit one item into the pending buffer.
    ///
    /// Returns `false` if the channel already left the `Open` state; rejection
    /// is a normal outcome, not an error.
    pub fn publish(&mut self, item: PayloadItem) -> bool {
        if !matches!(self.state, State::Open) {
            return false;
        }
        self.queue.push_back(item);
        self.wake();
        true
    }

    /// Closes the stream abnormally with `cause`.
    ///
    /// Returns whether *this* call performed the open-to-closed transition.
    /// Pending items are discarded, firing the removal hook for each, so the
    /// owner's accounting settles even when the consumer never drains them.
    /// The consumer observes `cause` on its next poll.
    pub fn close(&mut self, cause: AbortCause) -> bool {
        if !matches!(self.state, State::Open) {
            return false;
        }
        self.state = State::Closed(cause);
        while let Some(item) = self.queue.pop_front() {
            (self.on_removal)(&item);
        }
        self.wake();
        true
    }

    /// Whether the stream reached a terminal state (closed or fully consumed).
    pub fn is_complete(&self) -> bool {
        !matches!(self.state, State::Open)
    }

    /// Number of items currently sitting in the pending buffer.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Consumer side: polls the next item out of the pending buffer.
    ///
    /// Yields every admitted item in order, `Err(cause)` once the stream was
    /// closed abnormally, and `None` after the `Eof` item was consumed.
    pub fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<PayloadItem, AbortCause>>> {
        if let Some(item) = self.queue.pop_front() {
            (self.on_removal)(&item);
            if item.is_eof() {
                self.state = State::Complete;
            }
            return Poll::Ready(Some(Ok(item)));
        }

        match &self.state {
            State::Open => {
                self.waker = Some(cx.waker().clone());
                Poll::Pending
            }
            State::Closed(cause) => Poll::Ready(Some(Err(cause.clone()))),
            State::Complete => Poll::Ready(None),
        }
    }

    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

impl fmt::Debug for StreamChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Open => "open",
            State::Closed(_) => "closed",
            State::Complete => "complete",
        };
        f.debug_struct("StreamChannel").field("state", &state).field("pending", &self.queue.len()).finish()
    }
}
