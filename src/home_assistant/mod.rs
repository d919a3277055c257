//! Home Assistant REST adapter
//!
//! Reads every telemetry field by rendering its configured template and
//! writes charger commands as service calls.

#[cfg(feature = "home-assistant")]
pub mod client;
pub mod types;

#[cfg(feature = "home-assistant")]
pub use client::HomeAssistantClient;
pub use types::{ServiceCall, is_unknown, parse_bool, parse_number, parse_option};
