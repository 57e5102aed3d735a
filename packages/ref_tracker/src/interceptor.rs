use std::sync::OnceLock;
use std::{fmt, ptr};

use crate::pal::{Platform, PlatformFacade};
use crate::{
    DumpTrigger, ObjectId, ObjectModel, Report, Result, Tracker, TrackerBuilder, fail_fast,
};

/// Prepares the tracker of an [`Interceptor`]: locates the real lifecycle implementations and
/// reads the configuration.
pub type Bootstrap<M> = fn() -> Result<TrackerBuilder<M>>;

/// Process-wide entry point for intercepted lifecycle operations.
///
/// An interception provider keeps one of these in a `static` and routes the intercepted
/// create, increment and decrement calls through it. The tracker is bootstrapped on first
/// use, exactly once even if the first calls race. If the tracker services the process-wide
/// [`DumpTrigger`], the same first use installs the `SIGUSR1` handler that raises it. A
/// tracker with its own trigger leaves the process's signal dispositions alone.
///
/// If the bootstrap fails, the process is terminated via [`fail_fast()`].
///
/// # Examples
///
/// ```no_run
/// use ref_tracker::{
///     FinalizationCallback, Interceptor, NativeLibrary, ObjectId, ObjectModel, Result, Tracker,
///     TrackerBuilder, TrackerConfig, require_env_var,
/// };
///
/// type ObjectNew = unsafe extern "C" fn(usize) -> usize;
///
/// struct HostObjects {
///     _library: NativeLibrary,
///     object_new: ObjectNew,
/// }
///
/// impl ObjectModel for HostObjects {
///     type CreateArgs = usize;
///
///     fn create(&self, type_id: usize) -> ObjectId {
///         // SAFETY: The host library's constructor accepts any registered type id.
///         ObjectId::new(unsafe { (self.object_new)(type_id) })
///     }
///     # fn increment(&self, object: ObjectId) -> ObjectId { object }
///     # fn decrement(&self, _object: ObjectId) {}
///     # fn ref_count(&self, _object: ObjectId) -> u32 { 1 }
///     # fn type_name(&self, _object: ObjectId) -> String { String::new() }
///     # fn watch_finalization(&self, _object: ObjectId, _callback: FinalizationCallback) {}
///     // ...
/// }
///
/// fn bootstrap() -> Result<TrackerBuilder<HostObjects>> {
///     require_env_var("DYLD_FORCE_FLAT_NAMESPACE")?;
///
///     // SAFETY: The host library has no initialization routines with preconditions.
///     let library = unsafe { NativeLibrary::open("libhostobjects.so") }?;
///     // SAFETY: The exported symbol has exactly this signature.
///     let object_new = unsafe { library.function::<ObjectNew>("host_object_new") }?;
///
///     let model = HostObjects {
///         _library: library,
///         object_new,
///     };
///
///     Ok(Tracker::builder(model).config(TrackerConfig::from_env()))
/// }
///
/// static INTERCEPTOR: Interceptor<HostObjects> = Interceptor::new(bootstrap);
///
/// let object = INTERCEPTOR.create(7);
/// INTERCEPTOR.increment(object);
/// ```
pub struct Interceptor<M: ObjectModel> {
    bootstrap: Bootstrap<M>,
    tracker: OnceLock<Tracker<M>>,
}

impl<M: ObjectModel> Interceptor<M> {
    /// Creates an interceptor that bootstraps its tracker on first use.
    #[must_use]
    pub const fn new(bootstrap: Bootstrap<M>) -> Self {
        Self {
            bootstrap,
            tracker: OnceLock::new(),
        }
    }

    /// The tracker, bootstrapping it if this is the first use.
    #[must_use]
    pub fn tracker(&self) -> &Tracker<M> {
        self.tracker.get_or_init(|| {
            let tracker = match (self.bootstrap)() {
                Ok(builder) => builder.build(),
                Err(error) => fail_fast(&error),
            };

            install_signal_handler_for(&tracker, &PlatformFacade::real());

            tracker
        })
    }

    /// Intercepted object creation. See [`Tracker::create()`].
    pub fn create(&self, args: M::CreateArgs) -> ObjectId {
        self.tracker().create(args)
    }

    /// Intercepted reference increment. See [`Tracker::increment()`].
    pub fn increment(&self, object: ObjectId) -> ObjectId {
        self.tracker().increment(object)
    }

    /// Intercepted reference decrement. See [`Tracker::decrement()`].
    pub fn decrement(&self, object: ObjectId) {
        self.tracker().decrement(object);
    }

    /// Takes a report of all live tracked objects.
    #[must_use]
    pub fn report(&self) -> Report {
        self.tracker().report()
    }

    /// Prints a report of all live tracked objects to stdout.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn dump(&self) {
        self.tracker().dump();
    }
}

impl<M: ObjectModel> fmt::Debug for Interceptor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("tracker", &self.tracker.get())
            .finish_non_exhaustive()
    }
}

fn install_signal_handler_for<M: ObjectModel>(tracker: &Tracker<M>, platform: &impl Platform) {
    if !ptr::eq(tracker.dump_trigger(), DumpTrigger::process()) {
        tracing::debug!("tracker has its own dump trigger; SIGUSR1 handler not installed");
        return;
    }

    match platform.install_dump_signal_handler() {
        Ok(()) => tracing::debug!("SIGUSR1 prints a report of live objects"),
        Err(error) => tracing::warn!(
            %error,
            "cannot install the report signal handler; reports are only printed on request"
        ),
    }
}
