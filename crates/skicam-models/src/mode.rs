//! Zoom control mode.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Who drives the zoom: the automatic controller or an external caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZoomMode {
    /// The framing controller drives zoom and pan every tick.
    #[default]
    Auto,
    /// Zoom is driven by button/voice commands; the controller is idle.
    Manual,
}

impl ZoomMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoomMode::Auto => "auto",
            ZoomMode::Manual => "manual",
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, ZoomMode::Manual)
    }
}

impl fmt::Display for ZoomMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ZoomMode {
    type Err = ZoomModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "automatic" => Ok(ZoomMode::Auto),
            "manual" => Ok(ZoomMode::Manual),
            _ => Err(ZoomModeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown zoom mode: {0}")]
pub struct ZoomModeParseError(String);
