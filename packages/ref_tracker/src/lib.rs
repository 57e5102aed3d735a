#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Lifecycle tracking of reference-counted objects, for hunting leaks and refcount misuse.
//!
//! This package sits between a host object model and the code that uses it. Every object
//! creation, reference increment and reference decrement is recorded, optionally with the
//! call stack that performed it, until the object is finalized. At any time, a report can
//! list every live object with its complete history and the number of live objects per type.
//!
//! The core functionality includes:
//! - [`ObjectModel`] - The host object model: the real lifecycle operations plus inspection
//! - [`Tracker`] - Observes the lifecycle operations of a model and records them
//! - [`Interceptor`] - Process-wide, lazily bootstrapped tracker for interception providers
//! - [`Report`] - Snapshot of all live tracked objects, printable as text
//! - [`TrackerConfig`] - What to record, usually read from the environment
//!
//! This package is not meant for use in production, serving only as a development tool.
//!
//! # Simple Usage
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Mutex;
//!
//! use ref_tracker::{
//!     FinalizationCallback, LogFlags, ObjectId, ObjectModel, Tracker, TrackerConfig,
//! };
//!
//! /// Objects are numbered and named after their type.
//! #[derive(Default)]
//! struct Objects {
//!     live: Mutex<HashMap<ObjectId, (&'static str, u32)>>,
//! }
//!
//! impl ObjectModel for Objects {
//!     type CreateArgs = (usize, &'static str);
//!
//!     fn create(&self, (address, type_name): (usize, &'static str)) -> ObjectId {
//!         let object = ObjectId::new(address);
//!         self.live.lock().unwrap().insert(object, (type_name, 1));
//!         object
//!     }
//!
//!     fn increment(&self, object: ObjectId) -> ObjectId {
//!         self.live.lock().unwrap().get_mut(&object).unwrap().1 += 1;
//!         object
//!     }
//!
//!     fn decrement(&self, object: ObjectId) {
//!         self.live.lock().unwrap().get_mut(&object).unwrap().1 -= 1;
//!     }
//!
//!     fn ref_count(&self, object: ObjectId) -> u32 {
//!         self.live.lock().unwrap().get(&object).map_or(0, |o| o.1)
//!     }
//!
//!     fn type_name(&self, object: ObjectId) -> String {
//!         self.live.lock().unwrap()[&object].0.to_string()
//!     }
//!
//!     fn watch_finalization(&self, _object: ObjectId, _callback: FinalizationCallback) {}
//! }
//!
//! let tracker = Tracker::builder(Objects::default())
//!     .config(TrackerConfig::default().with_log_flags(LogFlags::REFS))
//!     .build();
//!
//! let widget = tracker.create((0x1000, "Widget"));
//! tracker.increment(widget);
//! tracker.decrement(widget);
//!
//! // Prints every live object with its history, then the per-type counts.
//! tracker.dump();
//! # assert_eq!(tracker.report().objects()[0].events().len(), 3);
//! ```
//!
//! # Configuration
//!
//! [`TrackerConfig::from_env()`] reads two environment variables:
//!
//! * `LOG_TYPE` - only objects whose type name starts with this prefix are tracked.
//! * `LOG_FLAGS` - any of `refs`, `backtrace` and `all`, separated by commas, pipes or
//!   whitespace. Without this variable, reference count changes are recorded without call
//!   stacks.
//!
//! # Reports on demand
//!
//! The [`Interceptor`] installs a `SIGUSR1` handler on Unix. Sending the signal to the process
//! requests a report, which the next lifecycle operation prints to stdout. Any other
//! asynchronous source can request a report via [`DumpTrigger::request()`].
//!
//! # Logging
//!
//! Lifecycle milestones such as initialization and startup failures are logged with
//! `tracing`. No events are logged from the lifecycle operations themselves.

mod config;
mod constants;
mod dump_trigger;
mod error;
mod event;
mod interceptor;
mod library;
mod object;
mod pal;
mod registry;
mod report;
mod stack;
mod symbols;
mod tracker;

#[cfg(test)]
mod fake_model;

pub use config::*;
pub use constants::{LOG_FLAGS_ENV_VAR, TYPE_FILTER_ENV_VAR};
pub use dump_trigger::*;
pub use error::*;
pub use event::*;
pub use interceptor::*;
pub use library::*;
pub use object::*;
pub use registry::{Generation, ObjectHistory, Registry};
pub use report::*;
pub use stack::*;
pub use symbols::{ManagedFrameOracle, NoManagedFrames};
pub use tracker::*;
