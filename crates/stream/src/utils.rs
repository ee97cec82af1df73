//! Utility macros shared by the stream crates.

/// Returns early with an error if a condition is not met.
///
/// Works like `assert!`, but yields `Err($error)` instead of panicking, which is
/// how stream and chain preconditions are checked before any transport I/O.
///
/// # Example
///
/// ```
/// use micro_stream::ensure;
/// use micro_stream::protocol::StreamError;
///
/// fn check(open: bool) -> Result<(), StreamError> {
///     ensure!(open, StreamError::illegal_state("stream is not active"));
///     Ok(())
/// }
///
/// assert!(check(false).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}
