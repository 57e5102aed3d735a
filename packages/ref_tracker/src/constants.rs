// A poisoned lock means a panic happened while tracker state was half-updated, so every
// subsequent report would be meaningless (we panic).
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - tracked object state \
    can no longer be trusted to reflect the lifecycle of the observed objects";

/// Maximum number of raw frames captured for one lifecycle event.
pub(crate) const BACKTRACE_DEPTH: usize = 50;

/// Name of the environment variable holding the optional type-name prefix filter.
pub const TYPE_FILTER_ENV_VAR: &str = "LOG_TYPE";

/// Name of the environment variable selecting what is recorded (`refs`, `backtrace`, `all`).
pub const LOG_FLAGS_ENV_VAR: &str = "LOG_FLAGS";
