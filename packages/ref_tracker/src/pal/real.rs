use std::ffi::c_void;
use std::{env, io, mem, ptr};

use crate::pal::Platform;

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

/// The platform that the build is targeting.
///
/// You would only use a different platform in unit tests that need to use a mock platform.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetPlatform;

// Real OS bindings are excluded from coverage measurement because they are tested via
// integration tests and their failure paths require OS-level failures.
#[cfg_attr(coverage_nightly, coverage(off))]
impl Platform for BuildTargetPlatform {
    fn native_symbol_names(&self, addresses: &[usize]) -> Vec<String> {
        addresses
            .iter()
            .map(|&address| native_symbol_name(address))
            .collect()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }

    #[cfg(unix)]
    fn install_dump_signal_handler(&self) -> io::Result<()> {
        extern "C" fn on_dump_signal(_signal: libc::c_int) {
            // Only an atomic store happens here, which is async-signal-safe.
            use crate::DumpTrigger;

            DumpTrigger::process().request();
        }

        let handler: extern "C" fn(libc::c_int) = on_dump_signal;

        // SAFETY: All zeroes is a valid sigaction.
        let mut action: libc::sigaction = unsafe { mem::zeroed() };

        #[expect(
            clippy::fn_to_numeric_cast_any,
            reason = "sigaction takes the handler as an integer"
        )]
        let handler_address = handler as libc::sighandler_t;
        action.sa_sigaction = handler_address;
        action.sa_flags = libc::SA_RESTART;

        // SAFETY: No safety requirements beyond passing a valid pointer.
        unsafe {
            libc::sigemptyset(&raw mut action.sa_mask);
        }

        // SAFETY: The handler only performs an async-signal-safe atomic store.
        let result = unsafe { libc::sigaction(libc::SIGUSR1, &raw const action, ptr::null_mut()) };

        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn install_dump_signal_handler(&self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "dump signal is only available on Unix",
        ))
    }
}

fn native_symbol_name(address: usize) -> String {
    let mut name = None;
    let mut location = None;

    backtrace::resolve(ptr::without_provenance_mut::<c_void>(address), |symbol| {
        if name.is_none() {
            name = symbol.name().map(|n| n.to_string());
        }

        if location.is_none() {
            if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                location = Some(format!("{}:{line}", file.display()));
            }
        }
    });

    match (name, location) {
        (Some(name), Some(location)) => format!("{name} at {location} [{address:#x}]"),
        (Some(name), None) => format!("{name} [{address:#x}]"),
        (None, _) => format!("<unknown> [{address:#x}]"),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::CapturedStack;

    #[test]
    fn unknown_address_still_gets_a_name() {
        let names = BUILD_TARGET_PLATFORM.native_symbol_names(&[0x10]);

        assert_eq!(names.len(), 1);
        assert!(names.first().is_some_and(|name| name.contains("0x10")));
    }

    #[test]
    fn resolves_one_name_per_address() {
        let stack = CapturedStack::capture();
        let names = BUILD_TARGET_PLATFORM.native_symbol_names(stack.frames());

        assert_eq!(names.len(), stack.len());
    }

    #[test]
    fn missing_env_var_is_none() {
        assert!(
            BUILD_TARGET_PLATFORM
                .env_var("REF_TRACKER_SURELY_NOT_SET_ANYWHERE")
                .is_none()
        );
    }
}
