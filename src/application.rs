//! Application layer
//!
//! The scrape run and the gate that decides when one may start.

pub mod scrape_orchestrator;
pub mod trigger_gate;

pub use scrape_orchestrator::{
    PreviousSample, RunOutcome, RunPermit, RunStage, ScrapeError, ScrapeOrchestrator, ScrapeSettings,
};
pub use trigger_gate::{TriggerError, TriggerGate, TriggerReceipt};
