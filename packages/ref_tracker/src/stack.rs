use crate::constants::BACKTRACE_DEPTH;

/// Raw instruction pointers of the call stack at the moment of a lifecycle event.
///
/// The first frame is the caller of [`capture()`][Self::capture]. Symbol names are not
/// resolved here: resolution is deferred until a report is generated to keep interception
/// cheap.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CapturedStack {
    frames: Box<[usize]>,
}

impl CapturedStack {
    /// Captures up to [`BACKTRACE_DEPTH`] frames of the current thread's call stack, starting
    /// with the caller.
    ///
    /// Must be called inline from the intercepted call, as this is the only point at which
    /// the caller's context is observable.
    #[inline(never)]
    #[must_use]
    pub fn capture() -> Self {
        #[expect(
            clippy::fn_to_numeric_cast_any,
            reason = "frames are matched against the start address of this function"
        )]
        let capture_address = Self::capture as usize;

        let mut frames = Vec::with_capacity(BACKTRACE_DEPTH);
        let mut reached_caller = false;

        backtrace::trace(|frame| {
            if !reached_caller && frame.symbol_address().addr() == capture_address {
                // Everything up to here belongs to the unwinder and to this function.
                frames.clear();
                reached_caller = true;
                return true;
            }

            frames.push(frame.ip().addr());
            frames.len() < BACKTRACE_DEPTH
        });

        Self {
            frames: frames.into_boxed_slice(),
        }
    }

    /// Creates a stack from already captured addresses.
    #[must_use]
    pub fn from_frames(frames: impl Into<Box<[usize]>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// The captured addresses, innermost frame first.
    #[must_use]
    pub fn frames(&self) -> &[usize] {
        &self.frames
    }

    /// Number of frames that were captured. May be less than the capture depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frames were captured at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
