// ground_station/src/mission.rs

//! 任务的开始与结束流程。
//!
//! 开始任务时启动任务计时器并标记任务进行中；结束任务时停止计时，
//! 把计时结果与最后一帧遥测中的航迹、孳生地合并成任务记录，交给存储协作方保存。

use chrono::{DateTime, Local, TimeZone};
use log::{info, warn};

use common_models::enums::MissionStatus;
use common_models::mission_models::{MissionPlan, MissionRecord, NewMission};
use common_models::storage::MissionStore;
use common_models::telemetry::TelemetryFrame;

use crate::error::ClientError;
use crate::mission_timer::MissionTimer;

/// 实时任务记录的地点描述
pub const LIVE_LOCATION: &str = "Live Location";

/// 任务记录上的展示日期，例如 `"Oct 17, 2026"`
pub fn mission_date_label<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%b %-d, %Y").to_string()
}

/// 构建任务记录。没有规划名称时使用 `Mission N`，N 为已保存任务数加一。
pub fn build_mission_record(
    plan: Option<&MissionPlan>,
    existing_missions: usize,
    duration_seconds: u64,
    last_frame: &TelemetryFrame,
    date: String,
) -> NewMission {
    let name = plan
        .map(|plan| plan.name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Mission {}", existing_missions + 1));
    NewMission {
        name,
        date,
        duration: duration_seconds,
        status: MissionStatus::Completed,
        location: LIVE_LOCATION.to_string(),
        gps_track: last_frame.gps_track.clone(),
        detected_sites: last_frame.detected_sites.clone(),
    }
}

/// 任务控制器，持有任务计时器和当前规划。
#[derive(Debug)]
pub struct MissionController<S> {
    store: S,
    timer: MissionTimer,
    active_plan: Option<MissionPlan>,
    active: bool,
}

impl<S: MissionStore> MissionController<S> {
    pub fn new(store: S) -> Self {
        Self { store, timer: MissionTimer::new(), active_plan: None, active: false }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn timer(&self) -> &MissionTimer {
        &self.timer
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn active_plan(&self) -> Option<&MissionPlan> {
        self.active_plan.as_ref()
    }

    /// 开始任务：计时器从 0 开始，任务标记为进行中。
    pub fn launch(&mut self, plan: Option<MissionPlan>) {
        if self.active {
            warn!("[任务控制] 上一个任务尚未结束，计时将从 0 重新开始。");
        }
        info!(
            "[任务控制] 开始任务: {}",
            plan.as_ref().map(|plan| plan.name.as_str()).unwrap_or("(未命名)")
        );
        self.active_plan = plan;
        self.active = true;
        self.timer.start();
    }

    /// 结束任务：停止计时，用最后一帧遥测构建任务记录并保存。
    ///
    /// 保存失败时任务仍然结束，错误返回给调用方。
    pub async fn end(&mut self, last_frame: &TelemetryFrame) -> Result<MissionRecord, ClientError> {
        if !self.active {
            return Err(ClientError::NoActiveMission);
        }
        let duration_seconds = self.timer.stop();
        let plan = self.active_plan.take();
        self.active = false;

        let existing_missions = match self.store.list_missions().await {
            Ok(missions) => missions.len(),
            Err(e) => {
                warn!("[任务控制] 读取已有任务数失败，按 0 计: {}", e);
                0
            }
        };
        let record = build_mission_record(
            plan.as_ref(),
            existing_missions,
            duration_seconds,
            last_frame,
            mission_date_label(&Local::now()),
        );
        info!("[任务控制] 任务结束: {}，时长 {} 秒，保存中...", record.name, duration_seconds);

        let saved = self.store.create_mission(record).await?;
        info!("[任务控制] 任务已保存: id={}", saved.id);
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common_models::enums::SiteType;
    use common_models::storage::InMemoryStore;
    use common_models::telemetry::{BreedingSiteInfo, GpsPoint};
    use std::time::Duration;

    fn last_frame() -> TelemetryFrame {
        TelemetryFrame {
            gps_track: vec![GpsPoint { lat: 14.5311, lon: 121.0574 }, GpsPoint { lat: 14.5312, lon: 121.0575 }],
            detected_sites: vec![BreedingSiteInfo {
                site_type: SiteType::Enclosed,
                object: "Tires".to_string(),
                bbox: [0.1, 0.1, 0.2, 0.2],
            }],
            ..TelemetryFrame::default()
        }
    }

    fn plan(name: &str) -> MissionPlan {
        MissionPlan {
            id: Some(1),
            name: name.to_string(),
            waypoints: vec![GpsPoint { lat: 14.53, lon: 121.05 }],
            altitude: 50.0,
            speed: 10.0,
        }
    }

    #[test]
    fn test_date_label() {
        let at = Utc.with_ymd_and_hms(2026, 10, 7, 9, 30, 0).unwrap();
        assert_eq!(mission_date_label(&at), "Oct 7, 2026");
    }

    #[test]
    fn test_record_name_falls_back_to_mission_number() {
        let record = build_mission_record(None, 2, 75, &last_frame(), "Oct 7, 2026".to_string());
        assert_eq!(record.name, "Mission 3");
        assert_eq!(record.duration, 75);
        assert_eq!(record.status, MissionStatus::Completed);
        assert_eq!(record.location, LIVE_LOCATION);
        assert_eq!(record.gps_track.len(), 2);
        assert_eq!(record.detected_sites.len(), 1);

        let named = build_mission_record(Some(&plan("Sector 7G")), 2, 75, &last_frame(), String::new());
        assert_eq!(named.name, "Sector 7G");
        let blank = build_mission_record(Some(&plan("  ")), 0, 1, &last_frame(), String::new());
        assert_eq!(blank.name, "Mission 1");
    }

    #[tokio::test(start_paused = true)]
    /// 开始、经过 75 秒、结束：保存的记录时长为 75 秒，航迹与孳生地来自最后一帧。
    async fn test_launch_and_end_saves_record() {
        let mut controller = MissionController::new(InMemoryStore::new());
        controller.launch(Some(plan("Sector 7G")));
        assert!(controller.is_active());

        tokio::time::advance(Duration::from_secs(75)).await;
        let saved = controller.end(&last_frame()).await.unwrap();

        assert!(!controller.is_active());
        assert!(controller.active_plan().is_none());
        assert_eq!(saved.id, 1);
        assert_eq!(saved.name, "Sector 7G");
        assert_eq!(saved.duration_seconds(), 75);
        assert_eq!(saved.gps_track, last_frame().gps_track);

        let stats = controller.store().get_stats().await.unwrap();
        assert_eq!(stats.total_flights, 1);
    }

    #[tokio::test]
    async fn test_end_without_launch_fails() {
        let mut controller = MissionController::new(InMemoryStore::new());
        assert!(matches!(controller.end(&last_frame()).await, Err(ClientError::NoActiveMission)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unnamed_missions_are_numbered() {
        let mut controller = MissionController::new(InMemoryStore::new());
        controller.launch(None);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(controller.end(&last_frame()).await.unwrap().name, "Mission 1");

        controller.launch(None);
        assert_eq!(controller.end(&last_frame()).await.unwrap().name, "Mission 2");
    }
}
