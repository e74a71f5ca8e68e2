// common_models/src/mission_models.rs

//! 任务记录与任务规划的数据模型，即存储协作方边界上交换的数据。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::MissionStatus;
use crate::telemetry::{BreedingSiteInfo, GpsPoint};

/// 任务结束时交给存储层的新任务记录（尚未分配 id）。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewMission {
    pub name: String,
    /// 展示用日期，例如 `"Oct 17, 2026"`。
    pub date: String,
    /// 任务时长（秒），来自客户端的任务计时器。
    pub duration: u64,
    pub status: MissionStatus,
    pub location: String,
    #[serde(default)]
    pub gps_track: Vec<GpsPoint>,
    #[serde(default)]
    pub detected_sites: Vec<BreedingSiteInfo>,
}

/// 已保存的任务记录。
///
/// `duration` 以字符串形式保存秒数，与飞行日志表的列类型一致。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MissionRecord {
    pub id: i64,
    pub name: String,
    pub date: String,
    pub duration: String,
    pub status: MissionStatus,
    pub location: String,
    #[serde(default)]
    pub gps_track: Vec<GpsPoint>,
    #[serde(default)]
    pub detected_sites: Vec<BreedingSiteInfo>,
    pub created_at: DateTime<Utc>,
}

impl MissionRecord {
    /// 解析出的任务时长（秒）。无法解析时按 0 计。
    pub fn duration_seconds(&self) -> u64 {
        self.duration.trim().parse().unwrap_or(0)
    }
}

/// 飞行统计。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MissionStats {
    pub total_flights: u64,
    pub total_flight_time_hours: f64,
}

impl MissionStats {
    /// 仪表盘上的展示文本，保留一位小数，例如 `"1.5 Hours"`。
    pub fn flight_time_label(&self) -> String {
        format!("{:.1} Hours", self.total_flight_time_hours)
    }
}

/// 任务规划。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MissionPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub waypoints: Vec<GpsPoint>,
    pub altitude: f64,
    pub speed: f64,
}

/// 规划列表只返回 id 与名称。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlanHeader {
    pub id: i64,
    pub name: String,
}
