//! Emulated host defects.

/// Known gaps and bugs of real hosts that [`SoftwareHost`](super::SoftwareHost)
/// can reproduce.
///
/// The default is a fully conformant host.
///
/// ```
/// use gleichklang::host::Quirks;
///
/// let quirks = Quirks::conformant().with_throws_on_consecutive_stop(true);
/// assert!(!quirks.missing_constant_source);
/// assert!(quirks.throws_on_consecutive_stop);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Quirks {
    /// The host has no native constant source; creating one raises `NotSupportedError`.
    pub missing_constant_source: bool,
    /// A second `stop()` on a scheduled source raises `InvalidStateError`
    /// instead of replacing the pending stop time.
    pub throws_on_consecutive_stop: bool,
    /// Looping a buffer that is a single frame long plays it once instead.
    pub refuses_single_sample_loops: bool,
}

impl Quirks {
    pub fn conformant() -> Self {
        Self::default()
    }

    /// Every emulated defect at once, like an old host would show them.
    pub fn legacy() -> Self {
        Self {
            missing_constant_source: true,
            throws_on_consecutive_stop: true,
            refuses_single_sample_loops: true,
        }
    }

    pub fn with_missing_constant_source(mut self, missing: bool) -> Self {
        self.missing_constant_source = missing;
        self
    }

    pub fn with_throws_on_consecutive_stop(mut self, throws: bool) -> Self {
        self.throws_on_consecutive_stop = throws;
        self
    }

    pub fn with_refuses_single_sample_loops(mut self, refuses: bool) -> Self {
        self.refuses_single_sample_loops = refuses;
        self
    }
}
