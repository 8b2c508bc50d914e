use serde::{Deserialize, Serialize};

/// Workspace chip rendering state within a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkspaceChipState {
    ActiveFocused,
    ActiveUnfocused,
    Occupied,
}

/// One monitor's workspace lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorLane {
    pub monitor_name: String,
    pub focused: bool,
    /// `0` when the active workspace could not be determined.
    pub active_workspace_id: i32,
    /// Ascending, deduplicated; at least the active id when known.
    pub workspace_ids: Vec<i32>,
}

impl MonitorLane {
    /// Chip state for a workspace id within this lane.
    pub fn chip_state(&self, workspace_id: i32) -> WorkspaceChipState {
        if workspace_id == self.active_workspace_id {
            if self.focused {
                WorkspaceChipState::ActiveFocused
            } else {
                WorkspaceChipState::ActiveUnfocused
            }
        } else {
            WorkspaceChipState::Occupied
        }
    }
}

/// Last-known Hyprland monitor/workspace layout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HyprSnapshot {
    /// Lanes ordered by monitor id.
    pub lanes: Vec<MonitorLane>,
    /// Set when the compositor could not be queried or reported no monitors.
    pub has_error: bool,
}

impl HyprSnapshot {
    pub fn failed() -> Self {
        Self {
            lanes: Vec::new(),
            has_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_state_tracks_focus() {
        let lane = MonitorLane {
            monitor_name: "DP-1".into(),
            focused: true,
            active_workspace_id: 3,
            workspace_ids: vec![1, 3],
        };
        assert_eq!(lane.chip_state(3), WorkspaceChipState::ActiveFocused);
        assert_eq!(lane.chip_state(1), WorkspaceChipState::Occupied);

        let unfocused = MonitorLane {
            focused: false,
            ..lane
        };
        assert_eq!(unfocused.chip_state(3), WorkspaceChipState::ActiveUnfocused);
    }
}
