//! Application state shared by the handlers

use std::sync::Arc;

use crate::application::trigger_gate::TriggerGate;
use crate::domain::repositories::SampleRepository;

#[derive(Clone)]
pub struct ApiState {
    pub gate: Arc<TriggerGate>,
    pub samples: Arc<dyn SampleRepository>,
    /// Country whose history the read endpoints serve
    pub country: String,
}

impl ApiState {
    pub fn new(gate: Arc<TriggerGate>, samples: Arc<dyn SampleRepository>, country: impl Into<String>) -> Self {
        Self {
            gate,
            samples,
            country: country.into(),
        }
    }
}
