//! # Solar Charger - Solar and home-battery aware EV charging
//!
//! A closed-loop controller that decides when and how fast an electric
//! vehicle charges, trading off solar self-consumption, house battery
//! protection and a guaranteed vehicle SoC by a nightly deadline.
//!
//! ## Features
//!
//! - **Battery tiers**: grid-power allowance keyed by house battery SoC,
//!   with a hysteresis band against oscillation
//! - **Charging plans**: solar following, nightly top-up and pass-through
//!   to external schedules
//! - **Fail-safe**: missing safety-relevant telemetry never leads to charging
//! - **Home Assistant**: template reads and service-call writes over REST
//! - **Status API**: health, live status, decision history and configuration
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `telemetry`: Typed telemetry provider and per-cycle snapshot
//! - `battery`: Battery Profile Selector
//! - `schedule`: Nightly window and deadline arithmetic
//! - `plan`: Charging Plan State Machine
//! - `controls`: Amperage Solver
//! - `actuator`: Actuation interface
//! - `controller`: Control loop orchestration
//! - `home_assistant`: REST adapter for telemetry and actuation
//! - `web`: HTTP status API

pub mod actuator;
pub mod battery;
pub mod config;
pub mod controller;
pub mod controls;
pub mod error;
pub mod home_assistant;
pub mod logging;
pub mod plan;
pub mod schedule;
pub mod telemetry;
pub mod web;


// Re-export commonly used types
pub use config::Config;
pub use controller::ChargingController;
pub use error::{ChargerError, Result};
