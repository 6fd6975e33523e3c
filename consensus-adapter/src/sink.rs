//! A typed, attach-once slot replacing the raw back-pointer the source wires into the network
//! shim and client proxy after construction.
//!
//! The Replica Core is constructed first and only then registers its message sink with the
//! components that need to call back into it, which rules out plain ownership (those
//! components are themselves built before the Replica Core's sink exists). `SinkHandle` models
//! that hand-off explicitly instead of leaving a raw, possibly-null pointer: `attach` may be
//! called exactly once, and every call site goes through `get`, which fails loudly instead of
//! dereferencing a null pointer if the wiring was never completed.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::AdapterError;

pub struct SinkHandle<T> {
    slot: ArcSwapOption<T>,
}

impl<T> SinkHandle<T> {
    pub fn unattached() -> Self {
        Self {
            slot: ArcSwapOption::from(None),
        }
    }

    /// Attaches the sink. Panics if called more than once: this is a one-time wiring step
    /// performed during construction, not a runtime re-configuration path.
    pub fn attach(&self, sink: Arc<T>) {
        let previous = self.slot.swap(Some(sink));
        assert!(previous.is_none(), "SinkHandle::attach called more than once");
    }

    pub fn is_attached(&self) -> bool {
        self.slot.load().is_some()
    }

    pub fn get(&self) -> Result<Arc<T>, AdapterError> {
        self.slot.load_full().ok_or(AdapterError::SinkNotAttached)
    }
}

impl<T> Default for SinkHandle<T> {
    fn default() -> Self {
        Self::unattached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unattached_sink_errors() {
        let sink: SinkHandle<u32> = SinkHandle::unattached();
        assert!(!sink.is_attached());
        assert!(matches!(sink.get(), Err(AdapterError::SinkNotAttached)));
    }

    #[test]
    fn attach_then_get_succeeds() {
        let sink: SinkHandle<u32> = SinkHandle::unattached();
        sink.attach(Arc::new(42));
        assert!(sink.is_attached());
        assert_eq!(*sink.get().unwrap(), 42);
    }

    #[test]
    #[should_panic(expected = "attach called more than once")]
    fn double_attach_panics() {
        let sink: SinkHandle<u32> = SinkHandle::unattached();
        sink.attach(Arc::new(1));
        sink.attach(Arc::new(2));
    }
}
