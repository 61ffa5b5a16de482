use std::cell::RefCell;
use std::rc::Rc;

use crate::protocol::AbortCause;

/// Handle to the response that will satisfy a request stream.
///
/// The connection creates one handle per exchange, binds a clone to the
/// request stream via [`set_response`](super::RequestStream::set_response) and
/// keeps the other to mark the outcome of writing: [`complete`](Self::complete)
/// after the response was fully written, or [`abort`](Self::abort) through the
/// stream's abort protocol. The first terminal transition wins; everything
/// after it is a no-op.
#[derive(Debug, Clone)]
pub struct ResponseHandle {
    state: Rc<RefCell<ResponseState>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResponseState {
    Pending,
    Complete,
    Aborted(AbortCause),
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self { state: Rc::new(RefCell::new(ResponseState::Pending)) }
    }

    /// Whether the response reached a terminal state, normally or by abort.
    pub fn is_complete(&self) -> bool {
        !matches!(*self.state.borrow(), ResponseState::Pending)
    }

    /// Marks the response fully written. No-op once terminal.
    pub fn complete(&self) {
        let mut state = self.state.borrow_mut();
        if matches!(*state, ResponseState::Pending) {
            *state = ResponseState::Complete;
        }
    }

    /// Abandons a response that will never be delivered. No-op once terminal.
    pub fn abort(&self, cause: AbortCause) {
        let mut state = self.state.borrow_mut();
        if matches!(*state, ResponseState::Pending) {
            *state = ResponseState::Aborted(cause);
        }
    }

    /// The cause this response was aborted with, if it was.
    pub fn abort_cause(&self) -> Option<AbortCause> {
        match &*self.state.borrow() {
            ResponseState::Aborted(cause) => Some(cause.clone()),
            _ => None,
        }
    }
}

impl Default for ResponseHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_terminal_transition_wins() {
        let handle = ResponseHandle::new();
        assert!(!handle.is_complete());

        handle.abort(AbortCause::PeerReset);
        assert!(handle.is_complete());
        assert_eq!(handle.abort_cause(), Some(AbortCause::PeerReset));

        handle.abort(AbortCause::ConnectionClosed);
        assert_eq!(handle.abort_cause(), Some(AbortCause::PeerReset));

        handle.complete();
        assert_eq!(handle.abort_cause(), Some(AbortCause::PeerReset));
    }

    #[test]
    fn complete_blocks_later_abort() {
        let handle = ResponseHandle::new();
        handle.complete();
        handle.abort(AbortCause::PeerReset);
        assert!(handle.is_complete());
        assert_eq!(handle.abort_cause(), None);
    }

    #[test]
    fn clones_share_state() {
        let handle = ResponseHandle::new();
        let other = handle.clone();
        other.complete();
        assert!(handle.is_complete());
    }
}
