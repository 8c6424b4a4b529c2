//! Domain module - Core entities and interfaces
//!
//! Samples, change detection, and the interfaces the scrape pipeline needs
//! from the outside world (page fetching, sample storage, diagnostics).

pub mod change_detector;
pub mod diagnostics;
pub mod fetcher;
pub mod repositories;
pub mod sample;

// Re-export commonly used items for convenience
pub use change_detector::changed;
pub use diagnostics::{DiagnosticEvent, DiagnosticLevel, DiagnosticSink};
pub use fetcher::{FetchError, PageFetcher};
pub use repositories::{SampleRepository, StoreError};
pub use sample::{PartialSample, Sample, StatField};
