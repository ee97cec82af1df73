//! Counters recorded against a stats engine that may go away.
//!
//! A [`Counter`] never keeps its engine alive: it holds an [`EngineHandle`], a
//! non-owning reference plus a liveness query. Incrementing a counter whose engine
//! was dropped is a silent no-op, so in-flight stream processing never fails because
//! of stats.

use std::fmt;
use std::sync::{Arc, Weak};

use thiserror::Error;
use tracing::trace;

/// The engine side of stats recording.
pub trait StatsRecorder: Send + Sync {
    fn record_counter(&self, name: &str, count: u64);
}

/// One segment of a counter name.
///
/// Segments are joined with `.`, so they must be non-empty and may not contain `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element(String);

#[derive(Debug, Error)]
#[error("invalid counter element `{element}`, expect a non-empty segment without `.`")]
pub struct InvalidElement {
    element: String,
}

impl Element {
    pub fn new<S: Into<String>>(element: S) -> Result<Self, InvalidElement> {
        let element = element.into();
        if element.is_empty() || element.contains('.') {
            return Err(InvalidElement { element });
        }
        Ok(Self(element))
    }

    /// Converts a static string into an `Element`.
    ///
    /// # Panics
    ///
    /// This function panics if the argument is not a valid element.
    pub fn from_static(element: &'static str) -> Self {
        match Self::new(element) {
            Ok(element) => element,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Element {
    type Error = InvalidElement;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A non-owning reference to a [`StatsRecorder`].
#[derive(Clone)]
pub struct EngineHandle {
    engine: Weak<dyn StatsRecorder>,
}

impl EngineHandle {
    pub fn new<R: StatsRecorder + 'static>(engine: &Arc<R>) -> Self {
        let engine: Weak<R> = Arc::downgrade(engine);
        Self { engine }
    }

    /// Returns true while the engine has not been dropped.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.engine.strong_count() > 0
    }

    /// Creates a counter named by joining `elements` with `.`.
    pub fn counter<I: IntoIterator<Item = Element>>(&self, elements: I) -> Counter {
        let name = elements.into_iter().map(|element| element.0).collect::<Vec<_>>().join(".");
        Counter { handle: self.clone(), name }
    }

    fn record(&self, name: &str, count: u64) -> bool {
        match self.engine.upgrade() {
            Some(engine) => {
                engine.record_counter(name, count);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle").field("alive", &self.is_alive()).finish()
    }
}

/// A time series counter.
#[derive(Debug, Clone)]
pub struct Counter {
    handle: EngineHandle,
    name: String,
}

impl Counter {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn increment(&self) {
        self.increment_by(1);
    }

    /// Adds `count` to the counter, or does nothing if the engine is gone.
    pub fn increment_by(&self, count: u64) {
        if !self.handle.record(&self.name, count) {
            trace!(counter = %self.name, count, "stats engine is gone, increment dropped");
        }
    }
}
