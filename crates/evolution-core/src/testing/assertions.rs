//! Test assertion macros and helpers.

use crate::error::EvolutionError;

/// Assert that a result is Ok.
///
/// # Example
///
/// ```ignore
/// let result = runner.run().await;
/// assert_ok!(result);
/// assert_ok!(result, "pending migrations should apply");
/// ```
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match &$expr {
            Ok(_) => (),
            Err(e) => panic!("assertion failed: expected Ok, got Err({:?})", e),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match &$expr {
            Ok(_) => (),
            Err(e) => panic!("assertion failed: {}: expected Ok, got Err({:?})", format_args!($($arg)+), e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match &$expr {
            Err(_) => (),
            Ok(v) => panic!("assertion failed: expected Err, got Ok({:?})", v),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match &$expr {
            Err(_) => (),
            Ok(v) => panic!("assertion failed: {}: expected Err, got Ok({:?})", format_args!($($arg)+), v),
        }
    };
}

/// Assert that an error matches a specific variant.
///
/// # Example
///
/// ```ignore
/// let result = runner.undo().await;
/// assert_err_variant!(result, EvolutionError::NothingToUndo);
/// ```
#[macro_export]
macro_rules! assert_err_variant {
    ($expr:expr, $variant:pat) => {
        match &$expr {
            Err($variant) => (),
            Err(e) => panic!(
                "assertion failed: expected {}, got {:?}",
                stringify!($variant),
                e
            ),
            Ok(v) => panic!(
                "assertion failed: expected Err({}), got Ok({:?})",
                stringify!($variant),
                v
            ),
        }
    };
}

/// Check whether an error is one of the bootstrap-state mismatches.
pub fn is_bootstrap_error(err: &EvolutionError) -> bool {
    matches!(
        err,
        EvolutionError::NotInitialized(_)
            | EvolutionError::TableAlreadyExists(_)
            | EvolutionError::TableDoesNotExist(_)
    )
}
