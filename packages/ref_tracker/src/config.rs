use crate::constants::{LOG_FLAGS_ENV_VAR, TYPE_FILTER_ENV_VAR};
use crate::pal::{Platform, PlatformFacade};
use crate::{Error, Result};

/// Selects which lifecycle details are recorded in addition to object creation.
///
/// Parsed from a list of flags separated by commas, pipes or whitespace:
///
/// * `refs` - record reference count increments and decrements.
/// * `backtrace` - capture the call stack of every recorded event.
/// * `all` - both of the above.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LogFlags {
    refs: bool,
    backtrace: bool,
}

impl LogFlags {
    /// Records object creation only.
    pub const NONE: Self = Self {
        refs: false,
        backtrace: false,
    };

    /// Records creation and reference count changes, without call stacks.
    pub const REFS: Self = Self {
        refs: true,
        backtrace: false,
    };

    /// Records everything, including call stacks.
    pub const ALL: Self = Self {
        refs: true,
        backtrace: true,
    };

    /// Parses a flag list. Unknown flags are logged and ignored.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let mut flags = Self::NONE;

        for token in value
            .split(|c: char| c == ',' || c == '|' || c.is_whitespace())
            .filter(|token| !token.is_empty())
        {
            match token.to_ascii_lowercase().as_str() {
                "refs" => flags.refs = true,
                "backtrace" => flags.backtrace = true,
                "all" => flags = Self::ALL,
                _ => tracing::warn!(flag = token, "ignoring unknown reference tracker log flag"),
            }
        }

        flags
    }

    /// Whether reference count changes are recorded.
    #[must_use]
    pub fn refs(self) -> bool {
        self.refs
    }

    /// Whether call stacks are captured.
    #[must_use]
    pub fn backtrace(self) -> bool {
        self.backtrace
    }
}

impl Default for LogFlags {
    fn default() -> Self {
        Self::REFS
    }
}

/// Configuration of a [`Tracker`][crate::Tracker]. Immutable once the tracker is built.
///
/// # Examples
///
/// ```
/// use ref_tracker::{LogFlags, TrackerConfig};
///
/// let config = TrackerConfig::default()
///     .with_log_flags(LogFlags::ALL)
///     .with_type_name_filter("Gtk");
///
/// assert!(config.accepts_type("GtkButton"));
/// assert!(!config.accepts_type("GdkPixbuf"));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrackerConfig {
    capture_backtrace: bool,
    track_refs: bool,
    type_name_filter: Option<String>,
}

impl TrackerConfig {
    /// Reads the configuration from the `LOG_FLAGS` and `LOG_TYPE` environment variables.
    ///
    /// If `LOG_FLAGS` is not set, reference count changes are tracked without call stacks.
    /// If `LOG_TYPE` is not set or empty, objects of every type are tracked.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_platform(&PlatformFacade::real())
    }

    pub(crate) fn from_platform(platform: &impl Platform) -> Self {
        let flags = platform
            .env_var(LOG_FLAGS_ENV_VAR)
            .map_or_else(LogFlags::default, |value| LogFlags::parse(&value));

        let config = Self::default().with_log_flags(flags);

        match platform.env_var(TYPE_FILTER_ENV_VAR) {
            Some(prefix) if !prefix.is_empty() => config.with_type_name_filter(prefix),
            _ => config,
        }
    }

    /// Replaces the recorded details with the given flags.
    #[must_use]
    pub fn with_log_flags(mut self, flags: LogFlags) -> Self {
        self.track_refs = flags.refs();
        self.capture_backtrace = flags.backtrace();
        self
    }

    /// Only tracks objects whose type name starts with `prefix`.
    #[must_use]
    pub fn with_type_name_filter(mut self, prefix: impl Into<String>) -> Self {
        self.type_name_filter = Some(prefix.into());
        self
    }

    /// Whether a call stack is captured for every recorded event.
    #[must_use]
    pub fn capture_backtrace(&self) -> bool {
        self.capture_backtrace
    }

    /// Whether reference count changes are recorded.
    #[must_use]
    pub fn track_refs(&self) -> bool {
        self.track_refs
    }

    /// The type name prefix that tracked objects must have, if any.
    #[must_use]
    pub fn type_name_filter(&self) -> Option<&str> {
        self.type_name_filter.as_deref()
    }

    /// Whether objects of the named type are tracked.
    #[must_use]
    pub fn accepts_type(&self, type_name: &str) -> bool {
        self.type_name_filter
            .as_deref()
            .is_none_or(|prefix| type_name.starts_with(prefix))
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            capture_backtrace: false,
            track_refs: true,
            type_name_filter: None,
        }
    }
}

/// Returns the value of an environment variable that must be set for interception to work.
///
/// Intended for use in the bootstrap function of an [`Interceptor`][crate::Interceptor].
///
/// # Errors
///
/// Returns [`Error::MissingPrecondition`] if the variable is not set.
pub fn require_env_var(name: &str) -> Result<String> {
    require_env_var_on(&PlatformFacade::real(), name)
}

pub(crate) fn require_env_var_on(platform: &impl Platform, name: &str) -> Result<String> {
    platform
        .env_var(name)
        .ok_or_else(|| Error::MissingPrecondition {
            variable: name.to_string(),
        })
}
