//! Actuation interface
//!
//! The controller only needs to know whether a write succeeded. Transport,
//! authentication and retries belong to the implementation.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Value written to an external entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntityValue {
    Switch(bool),
    Number(f64),
    Option(String),
}

impl std::fmt::Display for EntityValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityValue::Switch(true) => f.write_str("on"),
            EntityValue::Switch(false) => f.write_str("off"),
            EntityValue::Number(n) => write!(f, "{}", n),
            EntityValue::Option(o) => f.write_str(o),
        }
    }
}

/// Sink for charger commands
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Set `entity_id` to `value`; an error means the write was not applied
    async fn write_entity(&self, entity_id: &str, value: EntityValue) -> Result<()>;
}

/// One write issued by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityWrite {
    pub entity_id: String,
    pub value: EntityValue,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
