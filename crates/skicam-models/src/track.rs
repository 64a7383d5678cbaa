//! Track lifecycle types shared between the tracker and its consumers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rect::NormalizedRect;

/// Lifecycle state of a tracked object.
///
/// `New -> Tracked -> Lost -> Removed`, with `Lost -> Tracked` on
/// re-acquisition. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Spawned but not yet confirmed
    New,
    /// Matched in the current cycle
    Tracked,
    /// Coasting on its motion model
    Lost,
    /// Dropped; the id is retired
    Removed,
}

impl TrackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackState::New => "new",
            TrackState::Tracked => "tracked",
            TrackState::Lost => "lost",
            TrackState::Removed => "removed",
        }
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracker output entry: a stable id with its current box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackedBox {
    /// Track identifier, monotonic from 1 and never reused
    pub id: u32,
    /// Best current estimate of the box
    pub rect: NormalizedRect,
}

impl TrackedBox {
    pub fn new(id: u32, rect: NormalizedRect) -> Self {
        Self { id, rect }
    }
}
