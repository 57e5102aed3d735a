//! Reports of live tracked objects.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use foldhash::fast::RandomState;

use crate::registry::Registry;
use crate::symbols::SymbolResolver;
use crate::{Event, EventKind, ObjectId};

/// Snapshot of all live tracked objects, with their full histories and per-type counts.
///
/// A report is taken atomically with respect to all lifecycle operations and owns all of its
/// data, so it can be inspected or printed after the tracker has moved on.
///
/// The textual form (via [`Display`][fmt::Display]) lists every live object with its events
/// and resolved call stacks, then the number of live objects per type (most numerous first,
/// ties by type name), then the total number of tracked objects.
#[derive(Clone, Debug)]
pub struct Report {
    objects: Vec<ReportObject>,
    type_counts: Vec<TypeCount>,
    total_tracked: usize,
}

/// One live object in a [`Report`].
#[derive(Clone, Debug)]
pub struct ReportObject {
    object: ObjectId,
    type_name: Arc<str>,
    ref_count: u32,
    events: Vec<ReportEvent>,
}

/// One event in the history of a [`ReportObject`], with its call stack resolved to names.
#[derive(Clone, Debug)]
pub struct ReportEvent {
    kind: EventKind,
    previous_count: u32,
    new_count: u32,
    frames: Vec<Arc<str>>,
}

/// The number of live objects of one type in a [`Report`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TypeCount {
    type_name: Arc<str>,
    count: usize,
}

impl Report {
    /// Collects a report from the registry while holding its exclusion.
    ///
    /// Objects whose live reference count is zero are being finalized and are skipped, though
    /// they still count towards the total until the finalization is observed.
    pub(crate) fn collect(
        registry: &Registry,
        ref_count: impl Fn(ObjectId) -> u32,
        resolver: &SymbolResolver,
    ) -> Self {
        let _exclusion = registry.enter();

        let mut objects = Vec::new();
        let mut counts: HashMap<Arc<str>, usize, RandomState> = HashMap::default();

        registry.visit(|object, history| {
            let live_count = ref_count(object);
            if live_count == 0 {
                return;
            }

            let events = history
                .events()
                .iter()
                .map(|event| ReportEvent::resolve(event, resolver))
                .collect();

            objects.push(ReportObject {
                object,
                type_name: Arc::clone(history.shared_type_name()),
                ref_count: live_count,
                events,
            });

            let count = counts
                .entry(Arc::clone(history.shared_type_name()))
                .or_default();
            *count = count.saturating_add(1);
        });

        let mut type_counts: Vec<TypeCount> = counts
            .into_iter()
            .map(|(type_name, count)| TypeCount { type_name, count })
            .collect();
        type_counts.sort_unstable_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.type_name.cmp(&b.type_name))
        });

        Self {
            objects,
            type_counts,
            total_tracked: registry.len(),
        }
    }

    /// The live objects, in creation order.
    #[must_use]
    pub fn objects(&self) -> &[ReportObject] {
        &self.objects
    }

    /// Live object counts per type, most numerous first. Ties are ordered by type name.
    #[must_use]
    pub fn type_counts(&self) -> &[TypeCount] {
        &self.type_counts
    }

    /// The number of live objects of the named type.
    #[must_use]
    pub fn count_of(&self, type_name: &str) -> usize {
        self.type_counts
            .iter()
            .find(|tc| tc.type_name() == type_name)
            .map_or(0, TypeCount::count)
    }

    /// The number of objects in the registry when the report was taken.
    #[must_use]
    pub fn total_tracked(&self) -> usize {
        self.total_tracked
    }

    /// Whether the report lists no live objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Prints the report to stdout.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        println!("{self}");
    }
}

impl ReportObject {
    /// The identity of the object.
    #[must_use]
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// The type name observed when the object was created.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The live reference count when the report was taken.
    #[must_use]
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// The full history of the object, in chronological order.
    #[must_use]
    pub fn events(&self) -> &[ReportEvent] {
        &self.events
    }
}

impl ReportEvent {
    fn resolve(event: &Event, resolver: &SymbolResolver) -> Self {
        Self {
            kind: event.kind(),
            previous_count: event.previous_count(),
            new_count: event.new_count(),
            frames: event
                .stack()
                .map(|stack| resolver.resolve(stack))
                .unwrap_or_default(),
        }
    }

    /// The transition this event describes.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The reference count before the transition.
    #[must_use]
    pub fn previous_count(&self) -> u32 {
        self.previous_count
    }

    /// The reference count after the transition.
    #[must_use]
    pub fn new_count(&self) -> u32 {
        self.new_count
    }

    /// The resolved call stack, innermost first. Empty if no stack was captured.
    #[must_use]
    pub fn frames(&self) -> &[Arc<str>] {
        &self.frames
    }
}

impl TypeCount {
    /// The type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The number of live objects of this type.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }
}

impl fmt::Display for ReportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "\t{} {} -> {}",
            self.kind, self.previous_count, self.new_count
        )?;

        for frame in &self.frames {
            writeln!(f, "\t\t{frame}")?;
        }

        Ok(())
    }
}

impl fmt::Display for ReportObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} - {} - (refcount: {}):",
            self.type_name, self.object, self.ref_count
        )?;

        for event in &self.events {
            write!(f, "{event}")?;
        }

        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for object in &self.objects {
            writeln!(f, "{object}")?;
        }

        writeln!(f, "Living objects by allocated instances:")?;
        for type_count in &self.type_counts {
            writeln!(f, "\t{} {}", type_count.count, type_count.type_name)?;
        }
        writeln!(f)?;

        write!(f, "Total objects retained: {}", self.total_tracked)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::pal::{MockPlatform, PlatformFacade};
    use crate::{CapturedStack, LogFlags, NoManagedFrames, TrackerConfig};

    assert_impl_all!(Report: Send, Sync);
    assert_impl_all!(ReportObject: Send, Sync);

    fn resolver() -> SymbolResolver {
        let mut platform = MockPlatform::new();
        platform
            .expect_native_symbol_names()
            .returning(|addresses| addresses.iter().map(|a| format!("fn_{a:x}")).collect());

        SymbolResolver::new(Box::new(NoManagedFrames), PlatformFacade::from_mock(platform))
    }

    fn all_live(_: ObjectId) -> u32 {
        1
    }

    #[test]
    fn empty_registry_gives_empty_report() {
        let registry = Registry::new(TrackerConfig::default());

        let report = Report::collect(&registry, all_live, &resolver());

        assert!(report.is_empty());
        assert!(report.type_counts().is_empty());
        assert_eq!(report.total_tracked(), 0);
    }

    #[test]
    fn single_widget_scenario() {
        let registry = Registry::new(TrackerConfig::default());
        registry.on_create(ObjectId::new(0x1000), "Widget", 1);

        let report = Report::collect(&registry, all_live, &resolver());

        assert_eq!(report.count_of("Widget"), 1);
        assert_eq!(report.total_tracked(), 1);

        let object = &report.objects()[0];
        assert_eq!(object.type_name(), "Widget");
        assert_eq!(object.events().len(), 1);
        assert_eq!(object.events()[0].kind(), EventKind::Created);
        assert_eq!(
            (object.events()[0].previous_count(), object.events()[0].new_count()),
            (0, 1)
        );
    }

    #[test]
    fn type_counts_are_non_increasing() {
        let registry = Registry::new(TrackerConfig::default());
        let mut address = 0x1000_usize;
        for (type_name, instances) in [("Alpha", 1), ("Beta", 3), ("Gamma", 2), ("Delta", 3)] {
            for _ in 0..instances {
                registry.on_create(ObjectId::new(address), type_name, 1);
                address += 0x10;
            }
        }

        let report = Report::collect(&registry, all_live, &resolver());

        let counts: Vec<(&str, usize)> = report
            .type_counts()
            .iter()
            .map(|tc| (tc.type_name(), tc.count()))
            .collect();
        assert_eq!(
            counts,
            [("Beta", 3), ("Delta", 3), ("Gamma", 2), ("Alpha", 1)]
        );
    }

    #[test]
    fn objects_being_finalized_are_skipped_but_counted_in_total() {
        let registry = Registry::new(TrackerConfig::default());
        registry.on_create(ObjectId::new(0x1000), "Widget", 1);
        registry.on_create(ObjectId::new(0x2000), "Widget", 1);

        let report = Report::collect(
            &registry,
            |object| u32::from(object != ObjectId::new(0x2000)),
            &resolver(),
        );

        assert_eq!(report.objects().len(), 1);
        assert_eq!(report.count_of("Widget"), 1);
        assert_eq!(report.total_tracked(), 2);
    }

    #[test]
    fn events_carry_resolved_frames() {
        let registry = Registry::new(TrackerConfig::default().with_log_flags(LogFlags::ALL));
        registry.on_create(ObjectId::new(0x1000), "Widget", 1);

        let report = Report::collect(&registry, all_live, &resolver());

        let event = &report.objects()[0].events()[0];
        let stack_len = registry.history(ObjectId::new(0x1000)).unwrap().events()[0]
            .stack()
            .map_or(0, CapturedStack::len);
        assert_eq!(event.frames().len(), stack_len);
    }

    #[test]
    fn display_lists_objects_counts_and_total() {
        let registry = Registry::new(TrackerConfig::default());
        registry.on_create(ObjectId::new(0x1000), "Widget", 1);
        registry.on_increment(ObjectId::new(0x1000), 1, 2);

        let report = Report::collect(&registry, |_| 2, &resolver());
        let text = report.to_string();

        assert_eq!(
            text,
            "Widget - 0x1000 - (refcount: 2):\n\
             \tCreated 0 -> 1\n\
             \tRef 1 -> 2\n\
             \n\
             Living objects by allocated instances:\n\
             \t1 Widget\n\
             \n\
             Total objects retained: 1"
        );
    }
}
