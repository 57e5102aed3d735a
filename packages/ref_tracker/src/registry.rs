//! The registry of live tracked objects and their lifecycle histories.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use foldhash::fast::RandomState;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::{Event, ObjectId, TrackerConfig};

/// Distinguishes successive objects that occupied the same identity.
///
/// Generations increase monotonically in creation order within one registry.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Generation(u64);

impl Generation {
    /// The creation sequence number.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// The ordered lifecycle events of one tracked object.
#[derive(Clone, Debug)]
pub struct ObjectHistory {
    type_name: Arc<str>,
    generation: Generation,
    events: Vec<Event>,
}

impl ObjectHistory {
    /// The type name observed when the object was created.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The creation sequence number of this object.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The events in the order they reached the registry. The first is always the creation.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn shared_type_name(&self) -> &Arc<str> {
        &self.type_name
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    objects: HashMap<ObjectId, ObjectHistory, RandomState>,
    next_generation: u64,
}

/// Holds the global exclusion of a [`Registry`].
///
/// While this is held, no other thread can mutate or read the registry. The exclusion is
/// re-entrant: the holding thread may still call registry operations.
pub(crate) struct RegistryExclusion<'a> {
    _guard: ReentrantMutexGuard<'a, RefCell<RegistryState>>,
}

/// Maps the identity of every live tracked object to its lifecycle history.
///
/// Every operation runs under a single global exclusion, which also serializes the events of
/// one object in the order in which they arrive at the registry.
///
/// # Examples
///
/// ```
/// use ref_tracker::{ObjectId, Registry, TrackerConfig};
///
/// let registry = Registry::new(TrackerConfig::default());
/// let widget = ObjectId::new(0x1000);
///
/// registry.on_create(widget, "Widget", 1);
/// registry.on_increment(widget, 1, 2);
/// registry.on_decrement(widget, 2, 1);
///
/// assert_eq!(registry.history(widget).unwrap().events().len(), 3);
///
/// registry.on_finalize(widget);
/// assert!(registry.is_empty());
/// ```
pub struct Registry {
    config: TrackerConfig,
    state: ReentrantMutex<RefCell<RegistryState>>,
}

impl Registry {
    /// Creates an empty registry that records events as `config` dictates.
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: ReentrantMutex::new(RefCell::new(RegistryState::default())),
        }
    }

    /// The configuration the registry records events with.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Enters the global exclusion and keeps it until the returned guard is dropped.
    pub(crate) fn enter(&self) -> RegistryExclusion<'_> {
        RegistryExclusion {
            _guard: self.state.lock(),
        }
    }

    /// Starts tracking a newly created object with the given initial reference count.
    ///
    /// Does nothing and returns `None` if the type filter rejects `type_name`. Otherwise
    /// returns the generation of the new history, which a finalization notification must
    /// present to [`on_finalize_generation()`][Self::on_finalize_generation].
    ///
    /// An existing history for the same identity is replaced: its object must have been
    /// finalized without the registry being told.
    pub fn on_create(
        &self,
        object: ObjectId,
        type_name: &str,
        initial_count: u32,
    ) -> Option<Generation> {
        if !self.config.accepts_type(type_name) {
            return None;
        }

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let generation = Generation(state.next_generation);
        state.next_generation = state.next_generation.wrapping_add(1);

        let history = ObjectHistory {
            type_name: Arc::from(type_name),
            generation,
            events: vec![Event::created(initial_count, self.config.capture_backtrace())],
        };

        if state.objects.insert(object, history).is_some() {
            tracing::debug!(
                %object,
                generation = generation.get(),
                "replacing history of an object that was never finalized"
            );
        }

        Some(generation)
    }

    /// Records a reference count increment of a tracked object.
    ///
    /// Ignored if reference tracking is disabled or the object is not tracked.
    pub fn on_increment(&self, object: ObjectId, previous_count: u32, new_count: u32) {
        if !self.config.track_refs() {
            return;
        }

        self.append(object, |capture| {
            Event::incremented(previous_count, new_count, capture)
        });
    }

    /// Records a reference count decrement of a tracked object.
    ///
    /// Ignored if reference tracking is disabled or the object is not tracked.
    pub fn on_decrement(&self, object: ObjectId, previous_count: u32, new_count: u32) {
        if !self.config.track_refs() {
            return;
        }

        self.append(object, |capture| {
            Event::decremented(previous_count, new_count, capture)
        });
    }

    fn append(&self, object: ObjectId, make_event: impl FnOnce(bool) -> Event) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        if let Some(history) = state.objects.get_mut(&object) {
            history
                .events
                .push(make_event(self.config.capture_backtrace()));
        }
    }

    /// Stops tracking a finalized object, discarding its history.
    ///
    /// Returns whether the object was tracked.
    pub fn on_finalize(&self, object: ObjectId) -> bool {
        let guard = self.state.lock();
        let removed = guard.borrow_mut().objects.remove(&object);
        removed.is_some()
    }

    /// Stops tracking a finalized object, but only if its history still belongs to the
    /// given generation.
    ///
    /// A late notification about a previous occupant of a reused identity therefore leaves
    /// the history of the current occupant alone. Returns whether a history was removed.
    pub fn on_finalize_generation(&self, object: ObjectId, generation: Generation) -> bool {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let is_current = state
            .objects
            .get(&object)
            .is_some_and(|history| history.generation == generation);

        if is_current {
            state.objects.remove(&object);
        }

        is_current
    }

    /// Number of tracked objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().borrow().objects.len()
    }

    /// Whether no objects are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the object is tracked.
    #[must_use]
    pub fn contains(&self, object: ObjectId) -> bool {
        self.state.lock().borrow().objects.contains_key(&object)
    }

    /// A snapshot of the history of a tracked object.
    #[must_use]
    pub fn history(&self, object: ObjectId) -> Option<ObjectHistory> {
        self.state.lock().borrow().objects.get(&object).cloned()
    }

    /// Visits every tracked object in creation order while holding the exclusion.
    ///
    /// The visitor must not call mutating registry operations.
    pub(crate) fn visit(&self, mut visitor: impl FnMut(ObjectId, &ObjectHistory)) {
        let guard = self.state.lock();
        let state = guard.borrow();

        let mut objects: Vec<_> = state.objects.iter().collect();
        objects.sort_unstable_by_key(|(_, history)| history.generation);

        for (&object, history) in objects {
            visitor(object, history);
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("tracked_objects", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::{EventKind, LogFlags};

    assert_impl_all!(Registry: Send, Sync);

    const WIDGET: ObjectId = ObjectId::new(0x1000);
    const GADGET: ObjectId = ObjectId::new(0x2000);

    fn kinds(history: &ObjectHistory) -> Vec<EventKind> {
        history.events().iter().map(Event::kind).collect()
    }

    #[test]
    fn create_starts_history_with_created_event() {
        let registry = Registry::new(TrackerConfig::default());

        assert!(registry.on_create(WIDGET, "Widget", 1).is_some());

        let history = registry.history(WIDGET).unwrap();
        assert_eq!(history.type_name(), "Widget");
        assert_eq!(kinds(&history), [EventKind::Created]);
        assert_eq!(history.events()[0].to_string(), "Created 0 -> 1");
    }

    #[test]
    fn events_are_appended_in_call_order() {
        let registry = Registry::new(TrackerConfig::default());
        registry.on_create(WIDGET, "Widget", 1);

        registry.on_increment(WIDGET, 1, 2);
        registry.on_increment(WIDGET, 2, 3);
        registry.on_decrement(WIDGET, 3, 2);

        let history = registry.history(WIDGET).unwrap();
        assert_eq!(
            kinds(&history),
            [
                EventKind::Created,
                EventKind::Incremented,
                EventKind::Incremented,
                EventKind::Decremented
            ]
        );
        assert_eq!(history.events().last().unwrap().new_count(), 2);
    }

    #[test]
    fn filtered_type_is_never_tracked() {
        let config = TrackerConfig::default().with_type_name_filter("Gadget");
        let registry = Registry::new(config);

        assert!(registry.on_create(WIDGET, "Widget", 1).is_none());
        assert!(registry.on_create(GADGET, "Gadget", 1).is_some());

        // Refcount changes of the filtered object are accepted without effect.
        registry.on_increment(WIDGET, 1, 2);
        registry.on_decrement(WIDGET, 2, 1);

        assert!(!registry.contains(WIDGET));
        assert!(registry.contains(GADGET));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_identity_is_ignored() {
        let registry = Registry::new(TrackerConfig::default());

        registry.on_increment(WIDGET, 1, 2);
        registry.on_decrement(WIDGET, 2, 1);

        assert!(registry.is_empty());
        assert!(!registry.on_finalize(WIDGET));
    }

    #[test]
    fn ref_changes_ignored_when_refs_disabled() {
        let config = TrackerConfig::default().with_log_flags(LogFlags::NONE);
        let registry = Registry::new(config);
        registry.on_create(WIDGET, "Widget", 1);

        registry.on_increment(WIDGET, 1, 2);
        registry.on_decrement(WIDGET, 2, 1);

        assert_eq!(registry.history(WIDGET).unwrap().events().len(), 1);
    }

    #[test]
    fn backtraces_follow_config() {
        let registry = Registry::new(TrackerConfig::default().with_log_flags(LogFlags::ALL));
        registry.on_create(WIDGET, "Widget", 1);
        registry.on_increment(WIDGET, 1, 2);

        let history = registry.history(WIDGET).unwrap();
        assert!(history.events().iter().all(|event| event.stack().is_some()));

        let registry = Registry::new(TrackerConfig::default());
        registry.on_create(WIDGET, "Widget", 1);
        assert!(registry.history(WIDGET).unwrap().events()[0].stack().is_none());
    }

    #[test]
    fn finalize_removes_history() {
        let registry = Registry::new(TrackerConfig::default());
        registry.on_create(WIDGET, "Widget", 1);
        registry.on_increment(WIDGET, 1, 2);

        assert!(registry.on_finalize(WIDGET));

        assert!(!registry.contains(WIDGET));
        assert!(registry.history(WIDGET).is_none());
    }

    #[test]
    fn reused_identity_starts_fresh_history() {
        let registry = Registry::new(TrackerConfig::default());
        registry.on_create(WIDGET, "Widget", 1);
        registry.on_increment(WIDGET, 1, 2);
        registry.on_finalize(WIDGET);

        registry.on_create(WIDGET, "Gizmo", 1);

        let history = registry.history(WIDGET).unwrap();
        assert_eq!(history.type_name(), "Gizmo");
        assert_eq!(kinds(&history), [EventKind::Created]);
    }

    #[test]
    fn stale_generation_does_not_remove_new_occupant() {
        let registry = Registry::new(TrackerConfig::default());
        let first = registry.on_create(WIDGET, "Widget", 1).unwrap();
        registry.on_finalize(WIDGET);
        let second = registry.on_create(WIDGET, "Widget", 1).unwrap();

        assert_ne!(first, second);
        assert!(second.get() > first.get());
        assert_eq!(registry.history(WIDGET).unwrap().generation(), second);
        assert!(!registry.on_finalize_generation(WIDGET, first));
        assert!(registry.contains(WIDGET));

        assert!(registry.on_finalize_generation(WIDGET, second));
        assert!(!registry.contains(WIDGET));
    }

    #[test]
    fn visit_follows_creation_order() {
        let registry = Registry::new(TrackerConfig::default());
        let ids: Vec<ObjectId> = (1..=20).rev().map(|n| ObjectId::new(n * 0x10)).collect();
        for id in &ids {
            registry.on_create(*id, "Widget", 1);
        }

        let mut visited = Vec::new();
        registry.visit(|object, _| visited.push(object));

        assert_eq!(visited, ids);
    }

    #[test]
    fn operations_reenter_held_exclusion() {
        let registry = Registry::new(TrackerConfig::default());

        let _exclusion = registry.enter();
        registry.on_create(WIDGET, "Widget", 1);
        registry.on_increment(WIDGET, 1, 2);

        assert_eq!(registry.history(WIDGET).unwrap().events().len(), 2);
    }

    #[test]
    fn concurrent_increments_are_all_recorded() {
        const THREADS: u32 = 4;
        const PER_THREAD: u32 = 250;

        let registry = Arc::new(Registry::new(TrackerConfig::default()));
        registry.on_create(WIDGET, "Widget", 1);

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        registry.on_increment(WIDGET, 1, 2);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let history = registry.history(WIDGET).unwrap();
        assert_eq!(history.events().len(), (THREADS * PER_THREAD + 1) as usize);
    }
}
