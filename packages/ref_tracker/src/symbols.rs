//! Symbolication of captured call stacks.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use foldhash::fast::RandomState;

use crate::CapturedStack;
use crate::constants::ERR_POISONED_LOCK;
use crate::pal::{Platform, PlatformFacade};

/// Resolves addresses inside a managed runtime (e.g. a JIT-compiled language) to frame names.
///
/// This is the first tier of symbolication. Native symbol tables know nothing about
/// JIT-compiled code, so a runtime hosting such code can supply an oracle that does.
#[cfg_attr(test, mockall::automock)]
pub trait ManagedFrameOracle: Send + Sync + 'static {
    /// Returns a human-readable frame name, or `None` if the address is not managed code.
    fn resolve_managed_frame(&self, address: usize) -> Option<String>;
}

/// An oracle for processes without managed code: declines every address.
#[derive(Clone, Copy, Debug, Default)]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct NoManagedFrames;

impl ManagedFrameOracle for NoManagedFrames {
    fn resolve_managed_frame(&self, _address: usize) -> Option<String> {
        None
    }
}

/// Turns captured stacks into display strings, caching every resolved address.
///
/// The same instruction pointer recurs across many events, so every resolution is cached for
/// the lifetime of the resolver. The cache has its own lock, independent of the registry.
pub(crate) struct SymbolResolver {
    oracle: Box<dyn ManagedFrameOracle>,
    platform: PlatformFacade,
    cache: Mutex<HashMap<usize, Arc<str>, RandomState>>,
}

impl SymbolResolver {
    pub(crate) fn new(oracle: Box<dyn ManagedFrameOracle>, platform: PlatformFacade) -> Self {
        Self {
            oracle,
            platform,
            cache: Mutex::new(HashMap::default()),
        }
    }

    /// Resolves every frame of the stack, innermost first.
    pub(crate) fn resolve(&self, stack: &CapturedStack) -> Vec<Arc<str>> {
        let frames = stack.frames();
        let mut cache = self.cache.lock().expect(ERR_POISONED_LOCK);

        // Bulk native lookup for the whole stack, done at most once and only on a cache miss.
        let mut native_names: Option<Vec<String>> = None;

        frames
            .iter()
            .enumerate()
            .map(|(index, &address)| {
                if let Some(name) = cache.get(&address) {
                    return Arc::clone(name);
                }

                let name = match self.oracle.resolve_managed_frame(address) {
                    Some(managed) => Arc::from(managed),
                    None => native_names
                        .get_or_insert_with(|| self.platform.native_symbol_names(frames))
                        .get(index)
                        .map_or_else(
                            || Arc::from(format!("<unknown> [{address:#x}]")),
                            |native| Arc::from(native.as_str()),
                        ),
                };

                cache.insert(address, Arc::clone(&name));
                name
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn cached_len(&self) -> usize {
        self.cache.lock().expect(ERR_POISONED_LOCK).len()
    }
}

impl fmt::Debug for SymbolResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolResolver")
            .field("oracle", &"<oracle>")
            .field("platform", &self.platform)
            .field(
                "cached_symbols",
                &self.cache.lock().expect(ERR_POISONED_LOCK).len(),
            )
            .finish()
    }
}
