//! Internal helper macros.

/// Early-returns `$error` when `$predicate` does not hold.
///
/// Like `assert!`, but producing an `Err` instead of a panic. Used by the
/// codec for protocol limit checks.
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
