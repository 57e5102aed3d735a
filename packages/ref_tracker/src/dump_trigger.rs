use std::io;
use std::sync::atomic::{self, AtomicBool};

use crate::pal::{Platform, PlatformFacade};

static PROCESS_DUMP_TRIGGER: DumpTrigger = DumpTrigger::new();

/// A request to print a report, raised from an asynchronous context such as a signal handler.
///
/// Raising the request only stores to an atomic flag, so it is safe from any context. The
/// request is serviced by the next lifecycle operation that passes through the tracker, from
/// inside the tracker's serialized execution path. Requests raised before the previous one is
/// serviced coalesce into a single report.
#[derive(Debug)]
pub struct DumpTrigger {
    requested: AtomicBool,
}

impl DumpTrigger {
    /// Creates a trigger with no pending request.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
        }
    }

    /// The process-wide trigger that the dump signal raises.
    #[must_use]
    pub fn process() -> &'static Self {
        &PROCESS_DUMP_TRIGGER
    }

    /// Requests a report to be printed at the next opportunity.
    pub fn request(&self) {
        self.requested.store(true, atomic::Ordering::Release);
    }

    /// Whether a request is pending.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(atomic::Ordering::Acquire)
    }

    /// Clears the pending request, returning whether there was one.
    pub(crate) fn take(&self) -> bool {
        // Cheap load first, so the hot path does not write to a shared cache line.
        self.is_requested() && self.requested.swap(false, atomic::Ordering::AcqRel)
    }
}

/// Installs a `SIGUSR1` handler that raises the [process-wide trigger][DumpTrigger::process].
///
/// The [`Interceptor`][crate::Interceptor] does this on first use. Code that drives a
/// [`Tracker`][crate::Tracker] directly can call this itself.
///
/// # Errors
///
/// Fails if the operating system refuses the handler, or on platforms without Unix signals.
pub fn install_dump_signal_handler() -> io::Result<()> {
    PlatformFacade::real().install_dump_signal_handler()
}

impl Default for DumpTrigger {
    fn default() -> Self {
        Self::new()
    }
}
