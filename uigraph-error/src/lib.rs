#![deny(missing_docs)]

//! Error handling for the uigraph workspace.
//!
//! Every fallible operation returns a [`UiGraphResult`]. Errors carry a captured [`Backtrace`],
//! and are usually constructed through the [`uigraph_err!`], [`uigraph_bail!`] and
//! [`uigraph_panic!`] macros.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

// Alias for `Backtrace` so that `thiserror` does not detect the field and emit a nightly-only
// `provide()` implementation (`error_generic_member_access`). The type is identical.
type CapturedBacktrace = Backtrace;

/// The top-level error type for uigraph.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum UiGraphError {
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, CapturedBacktrace),
    /// An invalid argument was provided.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, CapturedBacktrace),
    /// A serialized buffer could not be read, e.g. it failed verification.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidSerde(ErrString, CapturedBacktrace),
    /// An assertion failed.
    #[error("{0}\nBacktrace:\n{1}")]
    AssertionFailed(ErrString, CapturedBacktrace),
    /// A wrapper for other errors, carrying additional context.
    #[error("{0}: {1}")]
    Context(ErrString, #[source] Box<UiGraphError>),
}

impl UiGraphError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        UiGraphError::Context(msg.into(), Box::new(self))
    }
}

impl Debug for UiGraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return [`UiGraphError`]s as their error type.
pub type UiGraphResult<T> = Result<T, UiGraphError>;

/// A trait for expect-ing a value, panicking with a message if it is missing.
pub trait UiGraphExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value if present, otherwise panics with the given message.
    /// Should be called only in contexts where the error condition represents a bug.
    fn uigraph_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> UiGraphExpect for Result<T, E>
where
    E: Into<UiGraphError>,
{
    type Output = T;

    #[inline(always)]
    fn uigraph_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| uigraph_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> UiGraphExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn uigraph_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = UiGraphError::AssertionFailed(msg.to_string().into(), Backtrace::capture());
            uigraph_panic!(err)
        })
    }
}

/// A convenient macro for creating a [`UiGraphError`].
#[macro_export]
macro_rules! uigraph_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::UiGraphError::OutOfBounds($idx, $start, $stop, Backtrace::capture())
    }};
    (Context: $msg:literal, $err:expr) => {{
        $crate::UiGraphError::Context($msg.into(), Box::new($err))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::UiGraphError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::uigraph_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a [`UiGraphError`] from the current function.
#[macro_export]
macro_rules! uigraph_bail {
    ($($tt:tt)+) => {
        return Err($crate::uigraph_err!($($tt)+).into())
    };
}

/// A convenient macro for panicking with a [`UiGraphError`] in the presence of a programmer error
/// (e.g., an invariant has been violated).
#[macro_export]
macro_rules! uigraph_panic {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        $crate::uigraph_panic!($crate::uigraph_err!(OutOfBounds: $idx, $start, $stop))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::uigraph_panic!($crate::uigraph_err!($variant: $fmt, $($arg),*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::UiGraphError = $err;
        panic!("{}", err.with_context(format!($fmt, $($arg),*)))
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::uigraph_panic!($crate::uigraph_err!($fmt, $($arg),*))
    };
    ($err:expr) => {{
        let err: $crate::UiGraphError = $err;
        panic!("{}", err)
    }};
}
