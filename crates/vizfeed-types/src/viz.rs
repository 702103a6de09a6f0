use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle phase of one mounted visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VizPhase {
    Idle,
    LoadingLibrary,
    Ready,
    Executing,
    Running,
    Errored,
    TearingDown,
}

/// Signals sent FROM the embed bootstrap TO the session registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum VizSignal {
    /// Library loading started
    Load,

    /// Every library in the manifest fired its load event
    LibrariesLoaded,

    /// The stored script is about to be invoked
    Execute,

    /// The stored script called `viz.ready()`
    Running,

    /// The stored script threw or called `viz.fail(message)`
    Failed { message: String },

    /// Navigation away or explicit close
    Teardown,

    /// All registered disposers ran
    Disposed,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountRequest {
    pub post_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizSessionSnapshot {
    pub session_id: Uuid,
    pub post_id: Uuid,
    pub phase: VizPhase,
    pub last_error: Option<String>,
    pub mounted_at: DateTime<Utc>,
    pub last_signal_at: DateTime<Utc>,
}
