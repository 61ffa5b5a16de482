use std::thread::{self, ThreadId};

/// The serialized execution context a connection's streams belong to.
///
/// One tokio task drives everything that happens on a connection, so thread
/// affinity is the only synchronization discipline the stream types rely on.
/// An `Affinity` captured when the connection starts lets every method assert,
/// in debug builds, that it is still running where it was created instead of
/// silently racing from another task's thread.
#[derive(Debug, Clone)]
pub struct Affinity {
    owner: ThreadId,
}

impl Affinity {
    /// Captures the current thread as the owning execution context.
    pub fn current() -> Self {
        Self { owner: thread::current().id() }
    }

    /// Debug-build assertion that the caller runs on the owning context.
    #[track_caller]
    #[inline]
    pub fn check(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "request stream touched outside its owning connection task"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_passes_on_owning_thread() {
        Affinity::current().check();
    }

    #[test]
    fn check_panics_on_foreign_thread() {
        let affinity = Affinity::current();
        let result = thread::spawn(move || affinity.check()).join();
        assert!(result.is_err());
    }
}
