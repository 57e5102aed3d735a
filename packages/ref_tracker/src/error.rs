use std::process;

use thiserror::Error;

/// Errors that prevent the tracker from starting up.
///
/// None of these have a degraded mode: if the tracker cannot observe every lifecycle
/// operation, the data it would collect is meaningless. The [`Interceptor`][crate::Interceptor]
/// therefore terminates the process when its bootstrap returns one of these.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An environment variable that must be present for interception to work is not set.
    #[error("the environment variable '{variable}' must be set to use the reference tracker")]
    MissingPrecondition {
        /// Name of the missing environment variable.
        variable: String,
    },

    /// The native library that holds the real lifecycle implementations could not be opened.
    #[error("failed to open library '{library}': {reason}")]
    LibraryUnavailable {
        /// Path or name of the library as given by the caller.
        library: String,

        /// A human-readable description of the problem, as reported by the loader.
        reason: String,
    },

    /// The library was opened but does not export the requested function.
    #[error("could not find the symbol '{symbol}' in '{library}': {reason}")]
    RealImplementationNotFound {
        /// The symbol that was looked up.
        symbol: String,

        /// Path or name of the library that was searched.
        library: String,

        /// A human-readable description of the problem, as reported by the loader.
        reason: String,
    },
}

/// A specialized `Result` type for tracker operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

/// Reports a fatal startup error and terminates the process.
#[cfg_attr(test, mutants::skip)] // Terminates the test process - manually tested.
#[cfg_attr(coverage_nightly, coverage(off))]
#[expect(
    clippy::exit,
    reason = "there is no degraded mode - tracking data would be meaningless"
)]
pub fn fail_fast(error: &Error) -> ! {
    tracing::error!(%error, "reference tracker cannot start");

    // The message must reach the user even when nobody installed a tracing subscriber.
    eprintln!();
    eprintln!("{error}");
    eprintln!();

    process::exit(1)
}
