use std::ffi::OsStr;
use std::fmt;

use libloading::Library;

use crate::{Error, Result};

/// A loaded native library that exports the real lifecycle implementations.
///
/// An interception provider that replaces the host's lifecycle functions uses this to find
/// the functions it replaced, so the tracker can delegate to them.
pub struct NativeLibrary {
    name: String,
    library: Library,
}

impl NativeLibrary {
    /// Loads the library with the given file name or path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LibraryUnavailable`] if the library cannot be loaded.
    ///
    /// # Safety
    ///
    /// Loading a library runs its initialization routines, which must be sound to run in
    /// the current process. See [`libloading::Library::new()`].
    pub unsafe fn open(name: impl AsRef<OsStr>) -> Result<Self> {
        let name = name.as_ref();

        // SAFETY: Forwarded to the caller.
        let library = unsafe { Library::new(name) }.map_err(|error| Error::LibraryUnavailable {
            library: name.to_string_lossy().into_owned(),
            reason: error.to_string(),
        })?;

        Ok(Self {
            name: name.to_string_lossy().into_owned(),
            library,
        })
    }

    /// Looks up an exported function by its symbol name.
    ///
    /// The returned function pointer is only valid while this library stays loaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RealImplementationNotFound`] if the library does not export `symbol`.
    ///
    /// # Safety
    ///
    /// `F` must be a function pointer type that matches the signature of the exported symbol.
    pub unsafe fn function<F: Copy>(&self, symbol: &str) -> Result<F> {
        // SAFETY: Forwarded to the caller.
        let function = unsafe { self.library.get::<F>(symbol.as_bytes()) }.map_err(|error| {
            Error::RealImplementationNotFound {
                symbol: symbol.to_string(),
                library: self.name.clone(),
                reason: error.to_string(),
            }
        })?;

        Ok(*function)
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
