//! HTTP API handlers for occp-collector
//!
//! - `/api/status`, `/api/toggle`, `/api/reset`, `/api/messages`: status
//!   surface and control commands
//! - `/api/capture`: event-based capture intake
//! - `/panel`: control panel page
//! - `/health`

pub mod capture;
pub mod health;
pub mod panel;
pub mod status;

pub use capture::capture_routes;
pub use health::health_routes;
pub use panel::panel_routes;
pub use status::{status_routes, ControlMessage};
