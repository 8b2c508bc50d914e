//! Hyprland monitor/workspace lanes over `hyprctl -j`.
//!
//! Every JSON field is optional: `hyprctl` output has shifted between
//! releases and a missing field must degrade a single lane, not the whole
//! snapshot.

use std::{sync::Arc, time::Duration};

use itertools::Itertools;
use log::warn;
use masterror::{AppError, AppResult};
use serde::Deserialize;
use shellstate_proto::{
    ports::{CommandRequest, CommandRunner},
    snapshot::hypr::{HyprSnapshot, MonitorLane},
};

use crate::runner::shell_quote;

#[derive(Debug, Deserialize)]
struct MonitorJson {
    id: Option<i64>,
    name: Option<String>,
    focused: Option<bool>,
    #[serde(rename = "activeWorkspace")]
    active_workspace: Option<ActiveWorkspaceJson>,
}

#[derive(Debug, Deserialize)]
struct ActiveWorkspaceJson {
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceJson {
    id: Option<i64>,
    monitor: Option<String>,
    windows: Option<i64>,
}

/// Builds lanes from the two `hyprctl -j` payloads.
pub fn build_lanes(monitors_json: &str, workspaces_json: &str) -> Result<Vec<MonitorLane>, serde_json::Error> {
    let mut monitors: Vec<MonitorJson> = serde_json::from_str(monitors_json)?;
    let workspaces: Vec<WorkspaceJson> = serde_json::from_str(workspaces_json)?;

    monitors.sort_by_key(|monitor| monitor.id.unwrap_or(i64::MAX));

    let lanes = monitors
        .into_iter()
        .filter_map(|monitor| {
            let monitor_name = monitor.name.filter(|name| !name.is_empty())?;
            // Special workspaces (scratchpads) report non-positive ids and
            // never belong in a lane.
            let active_workspace_id = monitor
                .active_workspace
                .and_then(|workspace| workspace.id)
                .filter(|id| *id > 0)
                .unwrap_or(0) as i32;

            let workspace_ids: Vec<i32> = workspaces
                .iter()
                .filter(|workspace| {
                    workspace.monitor.as_deref() == Some(monitor_name.as_str())
                        && workspace.windows.unwrap_or(0) > 0
                })
                .filter_map(|workspace| workspace.id)
                .filter(|id| *id > 0)
                .map(|id| id as i32)
                .chain((active_workspace_id > 0).then_some(active_workspace_id))
                .sorted_unstable()
                .dedup()
                .collect();

            Some(MonitorLane {
                monitor_name,
                focused: monitor.focused.unwrap_or(false),
                active_workspace_id,
                workspace_ids,
            })
        })
        .collect();

    Ok(lanes)
}

#[derive(Clone)]
pub struct HyprService {
    runner: Arc<dyn CommandRunner>,
}

impl HyprService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn query(&self, subcommand: &str, dedupe_key: &str) -> Option<String> {
        let request = CommandRequest::new(format!("hyprctl -j {subcommand}"))
            .timeout(Duration::from_secs(4))
            .dedupe_key(dedupe_key);

        match self.runner.run(request).await {
            Ok(output) => Some(output),
            Err(err) => {
                warn!("hyprctl {subcommand} failed: {err}");
                None
            }
        }
    }

    /// Reads the monitor lanes; any failure yields the error snapshot.
    pub async fn read(&self) -> HyprSnapshot {
        let (monitors, workspaces) = tokio::join!(
            self.query("monitors", "hypr-monitors"),
            self.query("workspaces", "hypr-workspaces"),
        );

        let (Some(monitors), Some(workspaces)) = (monitors, workspaces) else {
            return HyprSnapshot::failed();
        };

        match build_lanes(&monitors, &workspaces) {
            Ok(lanes) if !lanes.is_empty() => HyprSnapshot {
                lanes,
                has_error: false,
            },
            Ok(_) => HyprSnapshot::failed(),
            Err(err) => {
                warn!("hyprctl output did not parse: {err}");
                HyprSnapshot::failed()
            }
        }
    }

    /// Focuses a monitor and switches it to a workspace in one batch.
    /// Non-positive ids are special workspaces and are ignored.
    pub async fn switch_workspace(&self, monitor_name: &str, workspace_id: i32) -> AppResult<()> {
        if workspace_id <= 0 {
            return Ok(());
        }
        let monitor_name = monitor_name.trim();
        if monitor_name.is_empty() {
            return Err(AppError::internal("monitor name must not be blank"));
        }

        let batch = format!(
            "dispatch focusmonitor {monitor_name}; dispatch workspace {workspace_id}"
        );
        let request = CommandRequest::new(format!("hyprctl --batch {}", shell_quote(&batch)))
            .timeout(Duration::from_secs(4));

        self.runner
            .run(request)
            .await
            .map(|_| ())
            .map_err(|err| AppError::internal(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::runtime::Runtime;

    use crate::test_utils::FakeRunner;

    const MONITORS: &str = r#"[
        {"id": 1, "name": "HDMI-A-1", "focused": false,
         "activeWorkspace": {"id": 4}},
        {"id": 0, "name": "DP-1", "focused": true,
         "activeWorkspace": {"id": 2}}
    ]"#;

    const WORKSPACES: &str = r#"[
        {"id": 1, "monitor": "DP-1", "windows": 3},
        {"id": 2, "monitor": "DP-1", "windows": 0},
        {"id": 4, "monitor": "HDMI-A-1", "windows": 1},
        {"id": 7, "monitor": "HDMI-A-1", "windows": 0},
        {"id": 9, "monitor": "DP-1", "windows": 2}
    ]"#;

    #[test]
    fn lanes_are_ordered_by_monitor_id() {
        let lanes = build_lanes(MONITORS, WORKSPACES).expect("lanes");

        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[0].monitor_name, "DP-1");
        assert!(lanes[0].focused);
        assert_eq!(lanes[0].active_workspace_id, 2);
        // Occupied workspaces plus the (empty) active one, ascending.
        assert_eq!(lanes[0].workspace_ids, vec![1, 2, 9]);

        assert_eq!(lanes[1].monitor_name, "HDMI-A-1");
        assert_eq!(lanes[1].workspace_ids, vec![4]);
    }

    #[test]
    fn special_workspaces_stay_out_of_lanes() {
        let monitors = r#"[
            {"id": 0, "name": "DP-1", "focused": true, "activeWorkspace": {"id": 2}}
        ]"#;
        let workspaces = r#"[
            {"id": -98, "monitor": "DP-1", "windows": 1},
            {"id": 2, "monitor": "DP-1", "windows": 1}
        ]"#;

        let lanes = build_lanes(monitors, workspaces).expect("lanes");
        assert_eq!(lanes[0].workspace_ids, vec![2]);

        // A special workspace as the active one reads as unknown.
        let scratch_active = r#"[
            {"id": 0, "name": "DP-1", "focused": true, "activeWorkspace": {"id": -99}}
        ]"#;
        let lanes = build_lanes(scratch_active, "[]").expect("lanes");
        assert_eq!(lanes[0].active_workspace_id, 0);
        assert!(lanes[0].workspace_ids.is_empty());
    }

    #[test]
    fn switch_ignores_special_workspace_ids() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());

        let service = HyprService::new(Arc::clone(&runner) as Arc<dyn CommandRunner>);
        runtime
            .block_on(service.switch_workspace("DP-1", -98))
            .expect("special id should be a no-op");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn missing_fields_degrade_gracefully() {
        let lanes = build_lanes(r#"[{"name": "DP-1"}]"#, "[]").expect("lanes");
        assert_eq!(lanes.len(), 1);
        assert_eq!(lanes[0].active_workspace_id, 0);
        assert!(lanes[0].workspace_ids.is_empty());

        let nameless = build_lanes(r#"[{"id": 0}]"#, "[]").expect("lanes");
        assert!(nameless.is_empty());
    }

    #[test]
    fn read_flags_errors() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("hyprctl -j monitors", "not json");
        runner.respond("hyprctl -j workspaces", "[]");

        let service = HyprService::new(runner);
        let snapshot = runtime.block_on(service.read());
        assert!(snapshot.has_error);
        assert!(snapshot.lanes.is_empty());
    }

    #[test]
    fn read_builds_snapshot() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("hyprctl -j monitors", MONITORS);
        runner.respond("hyprctl -j workspaces", WORKSPACES);

        let service = HyprService::new(runner);
        let snapshot = runtime.block_on(service.read());
        assert!(!snapshot.has_error);
        assert_eq!(snapshot.lanes.len(), 2);
    }

    #[test]
    fn switch_batches_both_dispatches() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("--batch", "ok");

        let service = HyprService::new(Arc::clone(&runner) as Arc<dyn CommandRunner>);
        runtime
            .block_on(service.switch_workspace("DP-1", 5))
            .expect("switch should apply");

        let call = &runner.calls()[0];
        assert!(call.contains("focusmonitor DP-1"));
        assert!(call.contains("dispatch workspace 5"));
    }
}
