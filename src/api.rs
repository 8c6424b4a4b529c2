//! HTTP API
//!
//! Trigger endpoint, sample history and health check.

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ErrorResponse};
pub use routes::build_router;
pub use state::ApiState;
pub use types::SampleView;
