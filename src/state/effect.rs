//! Effect callbacks.
//!
//! Effects run once per commit of their instance, after the tree has been
//! applied. Dependency lists are accepted but not compared, so an effect runs
//! on every commit. A cleanup closure returned by an effect is accepted and
//! dropped without being called.

/// What an effect callback may return.
pub trait EffectOutput {
    /// Cleanup closure, if the effect produced one.
    fn into_cleanup(self) -> Option<Box<dyn FnOnce()>>;
}

impl EffectOutput for () {
    fn into_cleanup(self) -> Option<Box<dyn FnOnce()>> {
        None
    }
}

impl<F: FnOnce() + 'static> EffectOutput for Option<F> {
    fn into_cleanup(self) -> Option<Box<dyn FnOnce()>> {
        self.map(|f| Box::new(f) as Box<dyn FnOnce()>)
    }
}

/// Run an effect and drop whatever cleanup it returns.
pub(crate) fn run_effect<O: EffectOutput>(effect: impl FnOnce() -> O) {
    if effect().into_cleanup().is_some() {
        tracing::trace!("effect returned a cleanup; cleanups are not invoked");
    }
}
