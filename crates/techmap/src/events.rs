//! Event types and sinks for observing tech-mapping runs.
//!
//! This module defines [`TechMapEvent`] and a small set of sinks to emit, collect, or forward
//! events while executing [`crate::techmap::runner::TechMapping`] passes. Warnings travel
//! through this channel (and `tracing`); fatal conditions are returned as
//! [`crate::error::Error`].
use std::fmt;
use std::path::PathBuf;

/// Which mapping pass produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapPass {
    /// Exclusion pixels to nearest resource site.
    Resource,
    /// Exclusion pixels to generation rows via an existing resource map.
    Generation,
}

impl fmt::Display for MapPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapPass::Resource => f.write_str("resource"),
            MapPass::Generation => f.write_str("generation"),
        }
    }
}

/// Category of a non-fatal warning, so callers can filter noise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WarningCategory {
    /// Provenance mismatch, missing provenance, or dataset replacement in an output file.
    FileInput,
    /// A height request outside the measured range was extrapolated.
    Extrapolation,
    /// A shear exponent fell outside its plausible range.
    Interpolation,
}

/// Describes events emitted by tech-mapping operations.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum TechMapEvent {
    /// Emitted once all batches of a pass have been scheduled.
    RunStarted {
        pass: MapPass,
        /// Output dataset name.
        dataset: String,
        /// Number of supply-curve gids.
        gids: usize,
        /// Number of batches the gids were split into.
        batches: usize,
        /// Worker threads used.
        workers: usize,
    },

    /// Emitted when a batch result has been scattered into the output arrays.
    BatchCompleted {
        batch_id: usize,
        /// Batches completed so far, including this one.
        completed: usize,
        total: usize,
    },

    /// Non-fatal warning.
    Warning {
        category: WarningCategory,
        message: String,
    },

    /// Emitted after a dataset was persisted.
    DatasetSaved { path: PathBuf, dataset: String },

    /// Emitted when a pass has assembled its full index map.
    RunFinished {
        pass: MapPass,
        /// Pixels that resolved to a site.
        mapped: usize,
        /// Pixels left at the unmapped sentinel.
        unmapped: usize,
    },
}

impl TechMapEvent {
    pub fn warning(category: WarningCategory, message: impl Into<String>) -> Self {
        TechMapEvent::Warning {
            category,
            message: message.into(),
        }
    }

    /// Returns the warning category if this is a warning.
    pub fn warning_category(&self) -> Option<WarningCategory> {
        match self {
            TechMapEvent::Warning { category, .. } => Some(*category),
            _ => None,
        }
    }
}

/// A generic event sink that accepts [`TechMapEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: TechMapEvent);
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: TechMapEvent) {}
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(TechMapEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(TechMapEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(TechMapEvent),
{
    #[inline]
    fn send(&mut self, event: TechMapEvent) {
        (self.f)(event);
    }
}

/// An event sink that collects all events in a `Vec`.
#[derive(Default)]
pub struct VecSink {
    events: Vec<TechMapEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn into_inner(self) -> Vec<TechMapEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[TechMapEvent] {
        &self.events
    }

    /// Collected warnings of the given category, in emission order.
    pub fn warnings(&self, category: WarningCategory) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TechMapEvent::Warning {
                    category: c,
                    message,
                } if *c == category => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: TechMapEvent) {
        self.events.push(event);
    }
}
