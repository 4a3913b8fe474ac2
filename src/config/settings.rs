//! Settings sections of the engine configuration
//!
//! # Main Types
//!
//! - [`ExecutionSettings`] - Streaming and ghost-zone behaviour of pipeline updates
//! - [`TimeLoopSettings`] - Default timestep range for time-loop drivers
//! - [`CompositingSettings`] - Background colour, result broadcast and reduction topology
//! - [`LoggingSettings`] - Fallback tracing filter

use serde::{Deserialize, Serialize};

/// How pipeline updates execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Request one-domain-at-a-time streaming in new contracts
    pub streaming: bool,

    /// Request ghost zones from sources
    pub ghost_zones: bool,

    /// Emit per-domain progress messages
    pub report_progress: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            streaming: true,
            ghost_zones: false,
            report_progress: true,
        }
    }
}

/// Default timestep range for time-loop drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeLoopSettings {
    pub start: usize,

    /// Last timestep, inclusive. `None` runs to the end of the database.
    pub end: Option<usize>,

    pub stride: usize,
}

impl Default for TimeLoopSettings {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
            stride: 1,
        }
    }
}

/// Shape of the cross-rank reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    #[default]
    BinaryTree,
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositingSettings {
    /// Background colour as RGB in `[0, 1]`
    pub background: [f32; 3],

    /// Broadcast the composited image back so every rank holds it
    pub all_procs_need_result: bool,

    pub topology: TopologyKind,
}

impl Default for CompositingSettings {
    fn default() -> Self {
        Self {
            background: [0.0, 0.0, 0.0],
            all_procs_need_result: false,
            topology: TopologyKind::BinaryTree,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info,meshflow=debug".to_string(),
        }
    }
}
