use serde::{Deserialize, Serialize};

pub const DEFAULT_TILE_SIZE_PX: u32 = 32;
pub const DEFAULT_DIFFUSION_DEPTH_PX: u32 = 13;
pub const DEFAULT_PATH_SEARCH_BUDGET: u32 = 100;

/// What to do with an event payload that cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolPolicy {
    FailFast,
    LogAndSkip,
}

impl Default for ProtocolPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::FailFast
        } else {
            Self::LogAndSkip
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub tile_size: u32,
    pub diffusion_depth: u32,
    pub seed: u64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE_PX,
            diffusion_depth: DEFAULT_DIFFUSION_DEPTH_PX,
            seed: 0x7e4d_1a05_c0ff_ee11,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub statusbar_enabled: bool,
    pub animations_enabled: bool,
    pub limit_fps: bool,
    pub target_fps: u32,
    pub path_search_budget: u32,
    pub stall_warning_frames: u32,
    pub message_log_capacity: usize,
    pub protocol_policy: ProtocolPolicy,
    pub transitions: TransitionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            statusbar_enabled: false,
            animations_enabled: false,
            limit_fps: true,
            target_fps: 60,
            path_search_budget: DEFAULT_PATH_SEARCH_BUDGET,
            stall_warning_frames: 600,
            message_log_capacity: 64,
            protocol_policy: ProtocolPolicy::default(),
            transitions: TransitionConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn toggle_animations(&mut self) {
        self.animations_enabled = !self.animations_enabled;
    }

    pub fn toggle_status_bar(&mut self) {
        self.statusbar_enabled = !self.statusbar_enabled;
    }

    /// Seconds per frame, `None` when the frame rate is not limited.
    pub fn frame_budget_seconds(&self) -> Option<f32> {
        if !self.limit_fps {
            return None;
        }
        Some(1.0 / self.target_fps.max(1) as f32)
    }
}
