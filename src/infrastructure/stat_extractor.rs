//! Stat extraction from the statistics page
//!
//! The page shows its indicators as a row of sibling cards. Each indicator is
//! found by position inside that row, as described by a `StatLayout` field
//! table. A missing or unreadable card only blanks that one indicator and is
//! reported to the diagnostics sink; extraction itself never fails.

#![allow(clippy::uninlined_format_args)]

use scraper::{Html, Selector};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::domain::sample::{PartialSample, StatField};

/// Diagnostic message for a card that is not on the page
pub const MISSING_ELEMENT_MESSAGE: &str = "stat element missing";

/// Diagnostic message for a card whose text is not a number
pub const NOT_NUMERIC_MESSAGE: &str = "stat value not numeric";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid CSS selector for {field}: {selector} - {reason}")]
    InvalidSelector {
        field: StatField,
        selector: String,
        reason: String,
    },

    #[error("Stat layout has no field slots")]
    EmptyLayout,
}

/// Position of one indicator inside the repeating card row (1-based, as in `:nth-child`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlot {
    pub field: StatField,
    pub position: u32,
}

/// Where the indicators live on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatLayout {
    /// Structural path to the element whose children are the stat cards
    pub base_path: String,
    /// Selector of the number inside a card
    pub value_selector: String,
    /// Field → position table
    pub slots: Vec<FieldSlot>,
}

impl Default for StatLayout {
    fn default() -> Self {
        Self {
            base_path: "body > section.lastsection.container.box.effect7 > div > div > div > div".to_string(),
            value_selector: "span.big-number.text-black".to_string(),
            slots: vec![
                FieldSlot { field: StatField::PrimaryCount, position: 2 },
                FieldSlot { field: StatField::Suspects, position: 3 },
                FieldSlot { field: StatField::Recovered, position: 4 },
                FieldSlot { field: StatField::Deaths, position: 5 },
            ],
        }
    }
}

impl StatLayout {
    /// Default table with optional overrides for the two selector parts
    pub fn with_overrides(base_path: Option<String>, value_selector: Option<String>) -> Self {
        let default = Self::default();
        Self {
            base_path: base_path.unwrap_or(default.base_path),
            value_selector: value_selector.unwrap_or(default.value_selector),
            slots: default.slots,
        }
    }

    /// Full selector for the card at `position`
    pub fn selector_for(&self, position: u32) -> String {
        format!("{} > div:nth-child({}) > {}", self.base_path, position, self.value_selector)
    }
}

struct CompiledSlot {
    field: StatField,
    position: u32,
    selector_text: String,
    selector: Selector,
}

/// Extracts the indicators from page HTML
pub struct StatExtractor {
    slots: Vec<CompiledSlot>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl StatExtractor {
    /// Compile the layout's selectors. Invalid selectors are rejected up front.
    pub fn new(layout: &StatLayout, diagnostics: Arc<dyn DiagnosticSink>) -> Result<Self, ParsingError> {
        if layout.slots.is_empty() {
            return Err(ParsingError::EmptyLayout);
        }

        let slots = layout
            .slots
            .iter()
            .map(|slot| {
                let selector_text = layout.selector_for(slot.position);
                let selector = Selector::parse(&selector_text).map_err(|e| ParsingError::InvalidSelector {
                    field: slot.field,
                    selector: selector_text.clone(),
                    reason: e.to_string(),
                })?;
                Ok(CompiledSlot {
                    field: slot.field,
                    position: slot.position,
                    selector_text,
                    selector,
                })
            })
            .collect::<Result<Vec<_>, ParsingError>>()?;

        Ok(Self { slots, diagnostics })
    }

    /// Extract every configured indicator from `content`
    pub fn extract(&self, content: &str) -> PartialSample {
        let html = Html::parse_document(content);
        let mut sample = PartialSample::default();

        for slot in &self.slots {
            sample.set(slot.field, self.extract_slot(&html, slot));
        }

        debug!("Extracted {}/{} stat fields", sample.present_count(), self.slots.len());
        sample
    }

    fn extract_slot(&self, html: &Html, slot: &CompiledSlot) -> Option<i64> {
        let Some(element) = html.select(&slot.selector).next() else {
            warn!(field = %slot.field, index = slot.position, selector = %slot.selector_text, "Stat element missing");
            self.diagnostics.record(
                DiagnosticEvent::warning(MISSING_ELEMENT_MESSAGE)
                    .with("field", slot.field.as_str())
                    .with("index", slot.position)
                    .with("selector", slot.selector_text.as_str()),
            );
            return None;
        };

        let text = element.text().collect::<String>();
        let value = parse_count(&text);
        if value.is_none() {
            warn!(field = %slot.field, index = slot.position, text = %text.trim(), "Stat value not numeric");
            self.diagnostics.record(
                DiagnosticEvent::warning(NOT_NUMERIC_MESSAGE)
                    .with("field", slot.field.as_str())
                    .with("index", slot.position)
                    .with("selector", slot.selector_text.as_str())
                    .with("text", text.trim()),
            );
        }
        value
    }
}

fn is_group_separator(c: char) -> bool {
    matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '.' | ',')
}

/// Parse a displayed count such as `1 234` or `12.345`.
///
/// Digit-group separators are dropped; anything else non-numeric, or an
/// empty value, yields `None`.
pub fn parse_count(text: &str) -> Option<i64> {
    let digits: String = text.trim().chars().filter(|c| !is_group_separator(*c)).collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
