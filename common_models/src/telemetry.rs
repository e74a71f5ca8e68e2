// common_models/src/telemetry.rs

//! 遥测帧数据模型。
//!
//! `TelemetryFrame` 是服务端每个发布周期生成的一份不可变快照，以单个 JSON 对象的形式
//! 通过持久连接下发给客户端。字段名使用 camelCase，与前端仪表盘约定的线上格式一致。

use serde::{Deserialize, Serialize};

use crate::enums::{FlightMode, SiteType};

/// 一个经纬度点（WGS84，单位：度）。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GpsPoint {
    pub lat: f64,
    pub lon: f64,
}

/// 电池状态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    /// 电池电压（伏）。
    pub voltage: f64,
    /// 剩余电量百分比，始终位于 `[0, 100]` 区间内。
    pub percentage: f64,
}

/// 一处检测到的孳生地。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BreedingSiteInfo {
    #[serde(rename = "type")]
    pub site_type: SiteType,
    /// 被识别的物体，例如 "Tires"、"Sewage"、"Pots"。
    pub object: String,
    /// 图像中的包围框 `[x, y, w, h]`。
    pub bbox: [f64; 4],
}

/// 飞控模式开关面板。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FlightModes {
    pub angle: bool,
    pub position_hold: bool,
    pub return_to_home: bool,
    pub altitude_hold: bool,
    pub heading_hold: bool,
    pub airmode: bool,
    pub surface: bool,
    pub mc_braking: bool,
    pub beeper: bool,
}

/// 单个遥测帧。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    pub gps: GpsPoint,
    pub altitude: f64,
    /// 水平速度（m/s）。
    pub speed: f64,
    pub roll: f64,
    pub pitch: f64,
    pub heading: f64,
    /// 信号强度（dBm）。
    pub signal_strength: i32,
    pub battery: BatteryStatus,
    pub satellites: u32,
    /// 本次连接以来的飞行时间，`MM:SS` 格式。
    pub flight_time: String,
    pub distance_from_home: f64,
    pub flight_mode: FlightMode,
    pub armed: bool,
    pub vertical_speed: f64,
    pub breeding_site_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_breeding_site: Option<BreedingSiteInfo>,
    #[serde(default)]
    pub detected_sites: Vec<BreedingSiteInfo>,
    #[serde(default)]
    pub gps_track: Vec<GpsPoint>,
    pub modes: FlightModes,
}

/// 客户端在收到第一帧之前展示的默认遥测，与仪表盘的初始显示一致。
impl Default for TelemetryFrame {
    fn default() -> Self {
        Self {
            gps: GpsPoint { lat: 14.531120, lon: 121.057442 },
            altitude: 0.0,
            speed: 0.0,
            roll: 0.0,
            pitch: 0.0,
            heading: 345.0,
            signal_strength: -55,
            battery: BatteryStatus { voltage: 16.8, percentage: 99.0 },
            satellites: 14,
            flight_time: format_flight_time(0),
            distance_from_home: 0.0,
            flight_mode: FlightMode::Loiter,
            armed: false,
            vertical_speed: 0.0,
            breeding_site_detected: false,
            current_breeding_site: None,
            detected_sites: Vec::new(),
            gps_track: Vec::new(),
            modes: FlightModes::default(),
        }
    }
}

/// 将整秒数格式化为补零的 `MM:SS`。
///
/// 分钟部分不做 60 取模，超过一小时的飞行显示为 `"61:05"` 这样的形式。
pub fn format_flight_time(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
