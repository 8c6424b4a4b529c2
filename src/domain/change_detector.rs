//! Change detection between the last stored sample and a fresh extraction

use super::sample::{PartialSample, Sample};

/// Whether `next` should be persisted given the most recent stored sample.
///
/// With no previous sample the first observation is always kept. Otherwise
/// the four indicators are compared by value; absent equals absent and any
/// number differs from absent. Timestamp and country never take part.
pub fn changed(previous: Option<&Sample>, next: &PartialSample) -> bool {
    match previous {
        None => true,
        Some(previous) => previous.counts() != *next,
    }
}
