//! Internal helper macros.

/// Returns early with `Err($error)` unless `$predicate` holds.
///
/// The non-panicking counterpart of `assert!`, used for input validation:
///
/// ```ignore
/// ensure!(body_offset <= max_bytes, ParseError::too_large_request(body_offset, max_bytes));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
