//! Platform Abstraction Layer (PAL). Everything the tracker needs from the operating system
//! goes through here so that tests can substitute a mock platform.

mod abstractions;
mod facade;
mod real;

pub(crate) use abstractions::*;
pub(crate) use facade::*;
pub(crate) use real::*;
