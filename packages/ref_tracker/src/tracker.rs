use std::fmt;
use std::sync::Arc;

use crate::pal::PlatformFacade;
use crate::registry::Registry;
use crate::symbols::SymbolResolver;
use crate::{
    DumpTrigger, ManagedFrameOracle, NoManagedFrames, ObjectId, ObjectModel, Report,
    TrackerConfig,
};

/// Observes the lifecycle operations of an [`ObjectModel`] and records them in a [`Registry`].
///
/// Every lifecycle operation is delegated to the model unchanged and its result is returned
/// unchanged. Delegation happens outside the registry's exclusion, so the model is free to
/// notify finalization from a thread that holds the model's own locks. Only the count
/// readings and the registry update happen under the exclusion.
///
/// Before delegating, each operation services a pending [`DumpTrigger`] request by printing
/// a report to stdout.
///
/// # Examples
///
/// ```
/// use std::sync::Mutex;
///
/// use ref_tracker::{FinalizationCallback, ObjectId, ObjectModel, Tracker, TrackerConfig};
///
/// /// A model with a single object that is never finalized.
/// #[derive(Default)]
/// struct Singleton {
///     count: Mutex<u32>,
/// }
///
/// impl ObjectModel for Singleton {
///     type CreateArgs = ();
///
///     fn create(&self, (): ()) -> ObjectId {
///         *self.count.lock().unwrap() = 1;
///         ObjectId::new(0x1000)
///     }
///
///     fn increment(&self, object: ObjectId) -> ObjectId {
///         *self.count.lock().unwrap() += 1;
///         object
///     }
///
///     fn decrement(&self, _object: ObjectId) {
///         *self.count.lock().unwrap() -= 1;
///     }
///
///     fn ref_count(&self, _object: ObjectId) -> u32 {
///         *self.count.lock().unwrap()
///     }
///
///     fn type_name(&self, _object: ObjectId) -> String {
///         "Singleton".to_string()
///     }
///
///     fn watch_finalization(&self, _object: ObjectId, _callback: FinalizationCallback) {}
/// }
///
/// let tracker = Tracker::builder(Singleton::default())
///     .config(TrackerConfig::default())
///     .build();
///
/// let object = tracker.create(());
/// tracker.increment(object);
///
/// let report = tracker.report();
/// assert_eq!(report.count_of("Singleton"), 1);
/// assert_eq!(report.objects()[0].events().len(), 2);
/// ```
pub struct Tracker<M: ObjectModel> {
    model: M,
    registry: Arc<Registry>,
    resolver: SymbolResolver,
    dump_trigger: &'static DumpTrigger,
}

impl<M: ObjectModel> Tracker<M> {
    /// Starts building a tracker that observes `model`.
    #[must_use]
    pub fn builder(model: M) -> TrackerBuilder<M> {
        TrackerBuilder::new(model)
    }

    /// Creates an object via the model and starts tracking it, unless its type is filtered out.
    pub fn create(&self, args: M::CreateArgs) -> ObjectId {
        self.service_dump_request();

        let object = self.model.create(args);
        let type_name = self.model.type_name(object);
        let initial_count = self.model.ref_count(object);

        let Some(generation) = self.registry.on_create(object, &type_name, initial_count) else {
            return object;
        };

        let registry = Arc::downgrade(&self.registry);

        self.model.watch_finalization(
            object,
            Box::new(move |object| {
                // The tracker may be gone by the time a late finalization arrives.
                if let Some(registry) = registry.upgrade() {
                    registry.on_finalize_generation(object, generation);
                }
            }),
        );

        object
    }

    /// Adds a reference to the object via the model, recording the change if it is tracked.
    ///
    /// The recorded count is read after the real increment, when the exclusion is entered. If
    /// another thread incremented the same object in between, both events carry the later count.
    pub fn increment(&self, object: ObjectId) -> ObjectId {
        self.service_dump_request();

        let result = self.model.increment(object);

        if self.registry.config().track_refs() {
            let _exclusion = self.registry.enter();

            if self.registry.contains(object) {
                let new_count = self.model.ref_count(object);
                let previous_count = new_count.saturating_sub(1);
                self.registry.on_increment(object, previous_count, new_count);
            }
        }

        result
    }

    /// Removes a reference from the object via the model, recording the change if it is tracked.
    ///
    /// The change is recorded before the real decrement, so releasing the last reference is
    /// recorded even though the history is gone once the model finalizes the object.
    pub fn decrement(&self, object: ObjectId) {
        self.service_dump_request();

        if self.registry.config().track_refs() {
            let _exclusion = self.registry.enter();

            if self.registry.contains(object) {
                let previous_count = self.model.ref_count(object);
                let new_count = previous_count.saturating_sub(1);
                self.registry.on_decrement(object, previous_count, new_count);
            }
        }

        self.model.decrement(object);
    }

    /// Takes a report of all live tracked objects.
    #[must_use]
    pub fn report(&self) -> Report {
        Report::collect(
            &self.registry,
            |object| self.model.ref_count(object),
            &self.resolver,
        )
    }

    /// Prints a report of all live tracked objects to stdout.
    ///
    /// No lifecycle operation makes progress until the report is printed.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn dump(&self) {
        let _exclusion = self.registry.enter();
        self.report().print_to_stdout();
    }

    /// The registry that holds the histories of all tracked objects.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The configuration the tracker records events with.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        self.registry.config()
    }

    /// The model whose lifecycle operations are observed.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The trigger whose requests this tracker services.
    #[must_use]
    pub fn dump_trigger(&self) -> &'static DumpTrigger {
        self.dump_trigger
    }

    fn service_dump_request(&self) {
        if self.dump_trigger.take() {
            self.dump();
        }
    }
}

impl<M: ObjectModel> fmt::Debug for Tracker<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("registry", &self.registry)
            .field("resolver", &self.resolver)
            .field("dump_trigger", &self.dump_trigger)
            .finish_non_exhaustive()
    }
}

/// Builds a [`Tracker`].
///
/// Unless overridden, the tracker uses the default [`TrackerConfig`], resolves no managed
/// frames and services the process-wide [`DumpTrigger`].
#[must_use]
pub struct TrackerBuilder<M: ObjectModel> {
    model: M,
    config: TrackerConfig,
    oracle: Box<dyn ManagedFrameOracle>,
    dump_trigger: &'static DumpTrigger,
    platform: PlatformFacade,
}

impl<M: ObjectModel> TrackerBuilder<M> {
    fn new(model: M) -> Self {
        Self {
            model,
            config: TrackerConfig::default(),
            oracle: Box::new(NoManagedFrames),
            dump_trigger: DumpTrigger::process(),
            platform: PlatformFacade::real(),
        }
    }

    /// Sets the configuration, e.g. one read by [`TrackerConfig::from_env()`].
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the oracle that names frames of managed code in captured call stacks.
    pub fn oracle(mut self, oracle: impl ManagedFrameOracle) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    /// Sets the trigger whose requests the tracker services.
    pub fn dump_trigger(mut self, dump_trigger: &'static DumpTrigger) -> Self {
        self.dump_trigger = dump_trigger;
        self
    }

    #[cfg(test)]
    pub(crate) fn platform(mut self, platform: PlatformFacade) -> Self {
        self.platform = platform;
        self
    }

    /// Builds the tracker.
    pub fn build(self) -> Tracker<M> {
        tracing::debug!(
            track_refs = self.config.track_refs(),
            capture_backtrace = self.config.capture_backtrace(),
            type_name_filter = self.config.type_name_filter(),
            "reference tracker initialized"
        );

        Tracker {
            model: self.model,
            registry: Arc::new(Registry::new(self.config)),
            resolver: SymbolResolver::new(self.oracle, self.platform),
            dump_trigger: self.dump_trigger,
        }
    }
}

impl<M: ObjectModel> fmt::Debug for TrackerBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerBuilder")
            .field("config", &self.config)
            .field("dump_trigger", &self.dump_trigger)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}
