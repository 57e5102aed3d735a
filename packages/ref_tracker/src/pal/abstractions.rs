use std::fmt::Debug;
use std::io;

/// Operating system services used by the tracker.
///
/// All PAL calls must go through this trait, enabling them to be mocked.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Resolves native symbol names for a whole captured stack in one go.
    ///
    /// Returns exactly one display string per input address, in the same order. Addresses
    /// without symbol information still get a generic representation.
    fn native_symbol_names(&self, addresses: &[usize]) -> Vec<String>;

    /// Reads an environment variable, treating non-Unicode values as absent.
    fn env_var(&self, name: &str) -> Option<String>;

    /// Routes the out-of-band dump signal to the process-wide dump trigger.
    fn install_dump_signal_handler(&self) -> io::Result<()>;
}
