use std::cell::RefCell;
use std::fmt;

use hashbrown::HashMap;

use crate::error::HostError;
use crate::host::{ContextId, HostContext};

/// Names one capability probe.
///
/// Probes shipped with this crate live in [`probes`](super::probes); callers
/// may define their own with [`ProbeId::new`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProbeId(&'static str);

impl ProbeId {
    pub const fn new(name: &'static str) -> Self {
        ProbeId(name)
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Memoized probe verdicts, keyed by probe and context.
///
/// A host does not change what it supports while it runs, so a verdict is
/// final once computed. Failed probes are not remembered and run again on
/// the next `resolve`.
///
/// ```
/// use std::cell::Cell;
/// use gleichklang::capability::{CapabilityCache, ProbeId};
/// use gleichklang::host::{HostContext, SoftwareHost};
///
/// const ALWAYS: ProbeId = ProbeId::new("always");
///
/// let cache = CapabilityCache::new();
/// let context = HostContext::new(SoftwareHost::new(44100.0));
/// let runs = Cell::new(0);
///
/// for _ in 0..3 {
///     let supported = cache
///         .resolve(ALWAYS, &context, |_| {
///             runs.set(runs.get() + 1);
///             Ok(true)
///         })
///         .unwrap();
///     assert!(supported);
/// }
/// assert_eq!(runs.get(), 1);
/// ```
thread_local! {
    static GLOBAL: CapabilityCache = CapabilityCache::new();
}

#[derive(Default)]
pub struct CapabilityCache {
    verdicts: RefCell<HashMap<(ProbeId, ContextId), bool>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with the thread's shared cache.
    ///
    /// Contexts are single-threaded, so one cache per thread sees every
    /// context it could be asked about.
    /// Verdicts about a context leave this cache when the context is dropped.
    pub fn with_global<R>(f: impl FnOnce(&CapabilityCache) -> R) -> R {
        GLOBAL.with(f)
    }

    /// Drop the shared cache's verdicts about a context that no longer exists.
    pub(crate) fn forget_global(context: ContextId) {
        // the thread may be tearing down its locals already
        let _ = GLOBAL.try_with(|cache| cache.forget_id(context));
    }

    /// The verdict of `probe` for `context`, computing it with `compute` on first use.
    pub fn resolve<F>(&self, probe: ProbeId, context: &HostContext, compute: F) -> Result<bool, HostError>
    where
        F: FnOnce(&HostContext) -> Result<bool, HostError>,
    {
        let key = (probe, context.id());
        if let Some(&supported) = self.verdicts.borrow().get(&key) {
            tracing::debug!(%probe, context = %context.id(), supported, "capability cache hit");
            return Ok(supported);
        }

        // no borrow while probing: a probe may resolve other probes
        let supported = compute(context)?;
        tracing::debug!(%probe, context = %context.id(), supported, "probe resolved");

        self.verdicts.borrow_mut().insert(key, supported);
        Ok(supported)
    }

    /// A previously resolved verdict, without probing.
    pub fn get(&self, probe: ProbeId, context: &HostContext) -> Option<bool> {
        self.verdicts.borrow().get(&(probe, context.id())).copied()
    }

    /// Drop every verdict about `context`.
    pub fn forget(&self, context: &HostContext) {
        self.forget_id(context.id());
    }

    fn forget_id(&self, id: ContextId) {
        self.verdicts.borrow_mut().retain(|(_, ctx), _| *ctx != id);
    }

    pub fn clear(&self) {
        self.verdicts.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.verdicts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.borrow().is_empty()
    }
}

impl fmt::Debug for CapabilityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityCache")
            .field("verdicts", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::host::SoftwareHost;

    const PROBE: ProbeId = ProbeId::new("test-probe");
    const OTHER: ProbeId = ProbeId::new("other-probe");

    fn context() -> HostContext {
        HostContext::new(SoftwareHost::new(44100.0))
    }

    #[test]
    fn computes_once_per_key() {
        let cache = CapabilityCache::new();
        let context = context();
        let runs = Cell::new(0);
        let probe = |_: &HostContext| {
            runs.set(runs.get() + 1);
            Ok(false)
        };

        assert!(!cache.resolve(PROBE, &context, probe).unwrap());
        assert!(!cache.resolve(PROBE, &context, probe).unwrap());
        assert_eq!(runs.get(), 1);

        cache.resolve(OTHER, &context, probe).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn contexts_are_kept_apart() {
        let cache = CapabilityCache::new();
        let (a, b) = (context(), context());

        cache.resolve(PROBE, &a, |_| Ok(true)).unwrap();
        assert!(!cache.resolve(PROBE, &b, |_| Ok(false)).unwrap());
        assert_eq!(cache.get(PROBE, &a), Some(true));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn errors_are_not_memoized() {
        let cache = CapabilityCache::new();
        let context = context();

        let err = cache
            .resolve(PROBE, &context, |_| Err(HostError::invalid_state("closed")))
            .unwrap_err();
        assert_eq!(err.message(), "closed");
        assert!(cache.is_empty());

        assert!(cache.resolve(PROBE, &context, |_| Ok(true)).unwrap());
    }

    #[test]
    fn forget_drops_only_that_context() {
        let cache = CapabilityCache::new();
        let (a, b) = (context(), context());
        cache.resolve(PROBE, &a, |_| Ok(true)).unwrap();
        cache.resolve(PROBE, &b, |_| Ok(true)).unwrap();

        cache.forget(&a);
        assert_eq!(cache.get(PROBE, &a), None);
        assert_eq!(cache.get(PROBE, &b), Some(true));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn nested_resolution_does_not_deadlock_the_borrow() {
        let cache = CapabilityCache::new();
        let context = context();
        let outer = cache
            .resolve(PROBE, &context, |ctx| cache.resolve(OTHER, ctx, |_| Ok(true)))
            .unwrap();
        assert!(outer);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn dropped_contexts_leave_the_global_cache() {
        let before = CapabilityCache::with_global(CapabilityCache::len);

        for _ in 0..100 {
            let context = context();
            CapabilityCache::with_global(|cache| cache.resolve(PROBE, &context, |_| Ok(true))).unwrap();
        }
        assert_eq!(CapabilityCache::with_global(CapabilityCache::len), before);

        let live = context();
        CapabilityCache::with_global(|cache| cache.resolve(PROBE, &live, |_| Ok(true))).unwrap();
        assert_eq!(CapabilityCache::with_global(|cache| cache.get(PROBE, &live)), Some(true));
        drop(live);
        assert_eq!(CapabilityCache::with_global(CapabilityCache::len), before);
    }
}
