//! Records of individual lifecycle transitions.

use std::fmt;

use crate::CapturedStack;

/// The lifecycle transition that an [`Event`] describes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum EventKind {
    /// The object was constructed.
    Created,

    /// A reference to the object was added.
    Incremented,

    /// A reference to the object was removed.
    Decremented,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "Created",
            Self::Incremented => "Ref",
            Self::Decremented => "Unref",
        })
    }
}

/// One observed lifecycle transition of a tracked object.
///
/// Events are immutable once constructed. Dropping an event releases its captured stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Event {
    kind: EventKind,
    previous_count: u32,
    new_count: u32,
    stack: Option<CapturedStack>,
}

impl Event {
    /// Records the creation of an object whose reference count is now `new_count`.
    #[inline(never)]
    #[must_use]
    pub fn created(new_count: u32, capture_stack: bool) -> Self {
        Self::new(EventKind::Created, 0, new_count, capture_stack)
    }

    /// Records a reference count increment from `previous_count` to `new_count`.
    #[inline(never)]
    #[must_use]
    pub fn incremented(previous_count: u32, new_count: u32, capture_stack: bool) -> Self {
        Self::new(
            EventKind::Incremented,
            previous_count,
            new_count,
            capture_stack,
        )
    }

    /// Records a reference count decrement from `previous_count` to `new_count`.
    #[inline(never)]
    #[must_use]
    pub fn decremented(previous_count: u32, new_count: u32, capture_stack: bool) -> Self {
        Self::new(
            EventKind::Decremented,
            previous_count,
            new_count,
            capture_stack,
        )
    }

    #[inline(never)]
    fn new(kind: EventKind, previous_count: u32, new_count: u32, capture_stack: bool) -> Self {
        // Called directly, so that the stack starts in this function rather than in a closure.
        let stack = if capture_stack {
            Some(CapturedStack::capture())
        } else {
            None
        };

        Self {
            kind,
            previous_count,
            new_count,
            stack,
        }
    }

    /// The transition this event describes.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The reference count before the transition. Zero for [`EventKind::Created`].
    #[must_use]
    pub fn previous_count(&self) -> u32 {
        self.previous_count
    }

    /// The reference count after the transition.
    #[must_use]
    pub fn new_count(&self) -> u32 {
        self.new_count
    }

    /// The call stack captured when the event was recorded, if capture was enabled.
    #[must_use]
    pub fn stack(&self) -> Option<&CapturedStack> {
        self.stack.as_ref()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.kind, self.previous_count, self.new_count
        )
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::ffi::c_void;
    use std::ptr;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Event: Send, Sync);

    #[test]
    fn created_starts_from_zero() {
        let event = Event::created(1, false);

        assert_eq!(event.kind(), EventKind::Created);
        assert_eq!(event.previous_count(), 0);
        assert_eq!(event.new_count(), 1);
        assert!(event.stack().is_none());
    }

    #[test]
    fn increment_and_decrement_keep_both_counts() {
        let up = Event::incremented(1, 2, false);
        let down = Event::decremented(2, 1, false);

        assert_eq!(up.kind(), EventKind::Incremented);
        assert_eq!((up.previous_count(), up.new_count()), (1, 2));
        assert_eq!(down.kind(), EventKind::Decremented);
        assert_eq!((down.previous_count(), down.new_count()), (2, 1));
    }

    #[test]
    fn captures_stack_only_when_asked() {
        assert!(Event::incremented(1, 2, true).stack().is_some());
        assert!(Event::incremented(1, 2, false).stack().is_none());
    }

    #[test]
    fn captured_stack_starts_inside_event_construction() {
        let event = Event::created(1, true);
        let first = *event.stack().unwrap().frames().first().unwrap();

        let mut name = None;
        backtrace::resolve(ptr::without_provenance_mut::<c_void>(first), |symbol| {
            if name.is_none() {
                name = symbol.name().map(|n| n.to_string());
            }
        });

        let name = name.unwrap();
        assert!(name.contains("Event"), "{name}");
        assert!(!name.contains("backtrace::"), "{name}");
        assert!(!name.contains("CapturedStack"), "{name}");
    }

    #[test]
    fn renders_transition_line() {
        assert_eq!(Event::created(1, false).to_string(), "Created 0 -> 1");
        assert_eq!(Event::incremented(1, 2, false).to_string(), "Ref 1 -> 2");
        assert_eq!(Event::decremented(2, 1, false).to_string(), "Unref 2 -> 1");
    }
}
