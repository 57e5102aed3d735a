use std::fmt::Debug;
use std::io;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::pal::MockPlatform;
use crate::pal::{BUILD_TARGET_PLATFORM, BuildTargetPlatform, Platform};

#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Real(&'static BuildTargetPlatform),

    #[cfg(test)]
    Mock(Arc<MockPlatform>),
}

impl PlatformFacade {
    pub(crate) fn real() -> Self {
        Self::Real(&BUILD_TARGET_PLATFORM)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockPlatform) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl Platform for PlatformFacade {
    fn native_symbol_names(&self, addresses: &[usize]) -> Vec<String> {
        match self {
            Self::Real(p) => p.native_symbol_names(addresses),
            #[cfg(test)]
            Self::Mock(p) => p.native_symbol_names(addresses),
        }
    }

    fn env_var(&self, name: &str) -> Option<String> {
        match self {
            Self::Real(p) => p.env_var(name),
            #[cfg(test)]
            Self::Mock(p) => p.env_var(name),
        }
    }

    fn install_dump_signal_handler(&self) -> io::Result<()> {
        match self {
            Self::Real(p) => p.install_dump_signal_handler(),
            #[cfg(test)]
            Self::Mock(p) => p.install_dump_signal_handler(),
        }
    }
}

impl From<&'static BuildTargetPlatform> for PlatformFacade {
    fn from(p: &'static BuildTargetPlatform) -> Self {
        Self::Real(p)
    }
}

#[cfg(test)]
impl From<MockPlatform> for PlatformFacade {
    fn from(p: MockPlatform) -> Self {
        Self::Mock(Arc::new(p))
    }
}

impl Debug for PlatformFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real(p) => p.fmt(f),
            #[cfg(test)]
            Self::Mock(p) => p.fmt(f),
        }
    }
}
