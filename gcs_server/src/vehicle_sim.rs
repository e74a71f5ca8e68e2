//! 单个模拟飞行器的状态与推进规则。
//!
//! 这里只有纯数据和更新规则，不做任何 I/O：`VehicleSimState::advance` 接收当前时刻和随机源，
//! 返回下一帧遥测。发送由 `ws_server::telemetry_publisher` 和 `ws_server::client_session` 负责。
//!
//! 抖动只保证范围，不保证分布。

use common_models::enums::{FlightMode, SiteType};
use common_models::telemetry::{
    format_flight_time, BatteryStatus, BreedingSiteInfo, FlightModes, GpsPoint, TelemetryFrame,
};
use rand::Rng;
use std::collections::VecDeque;
use tokio::time::Instant;

use crate::config::TelemetryConfig;

/// 基准位置与抖动幅度（度）
pub const BASE_LAT: f64 = 14.531120;
pub const BASE_LON: f64 = 121.057442;
pub const POSITION_JITTER: f64 = 0.0005;
/// 高度基准（米）与抖动
pub const BASE_ALTITUDE: f64 = 47.9;
pub const ALTITUDE_JITTER: f64 = 1.0;
/// 水平速度基准（m/s）与抖动
pub const BASE_SPEED: f64 = 11.3;
pub const SPEED_JITTER: f64 = 0.5;
pub const ROLL_JITTER: f64 = 2.5;
pub const BASE_PITCH: f64 = -5.0;
pub const PITCH_JITTER: f64 = 1.5;
pub const BASE_HEADING: f64 = 345.0;
pub const HEADING_JITTER: f64 = 2.5;
pub const BASE_VERTICAL_SPEED: f64 = -6.8;
pub const VERTICAL_SPEED_JITTER: f64 = 0.1;

pub const SIGNAL_STRENGTH_DBM: i32 = -55;
pub const SATELLITE_COUNT: u32 = 14;
/// 满电电压（伏），实际电压按电量百分比线性换算
pub const FULL_CHARGE_VOLTAGE: f64 = 16.8;
/// 起飞点距离基准（米），每秒增加 1
pub const BASE_DISTANCE_FROM_HOME: f64 = 4057.0;

const SITE_OBJECTS: [(&str, SiteType); 3] =
    [("Tires", SiteType::Enclosed), ("Pots", SiteType::Enclosed), ("Sewage", SiteType::Open)];

/// 模拟器固定开启的模式开关
pub fn simulated_modes() -> FlightModes {
    FlightModes {
        angle: true,
        position_hold: true,
        return_to_home: false,
        altitude_hold: true,
        heading_hold: false,
        airmode: true,
        surface: true,
        mc_braking: true,
        beeper: false,
    }
}

/// 从遥测配置中取出的模拟参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub initial_battery_percentage: f64,
    pub battery_drain_per_tick: f64,
    pub site_detection_probability: f64,
    pub max_track_points: usize,
}

impl From<&TelemetryConfig> for SimulationParams {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            initial_battery_percentage: config.initial_battery_percentage,
            battery_drain_per_tick: config.battery_drain_per_tick,
            site_detection_probability: config.site_detection_probability,
            max_track_points: config.max_track_points,
        }
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self::from(&TelemetryConfig::default())
    }
}

/// 一个连接独占的模拟飞行器状态。
///
/// 电量在推送期间单调不增，且始终位于 `[0, 100]`；`armed` 只有在解锁指令被接受后才为 `true`。
#[derive(Debug, Clone)]
pub struct VehicleSimState {
    battery_percentage: f64,
    mission_started_at: Instant,
    armed: bool,
    gps_track: VecDeque<GpsPoint>,
    detected_sites: Vec<BreedingSiteInfo>,
    params: SimulationParams,
}

impl VehicleSimState {
    pub fn new(params: SimulationParams, mission_started_at: Instant) -> Self {
        Self {
            battery_percentage: params.initial_battery_percentage.clamp(0.0, 100.0),
            mission_started_at,
            armed: false,
            gps_track: VecDeque::new(),
            detected_sites: Vec::new(),
            params,
        }
    }

    pub fn battery_percentage(&self) -> f64 {
        self.battery_percentage
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    pub fn set_armed(&mut self, armed: bool) {
        self.armed = armed;
    }

    pub fn mission_started_at(&self) -> Instant {
        self.mission_started_at
    }

    pub fn gps_track_len(&self) -> usize {
        self.gps_track.len()
    }

    pub fn detected_site_count(&self) -> usize {
        self.detected_sites.len()
    }

    /// 推进一个发布周期并生成对应的遥测帧。
    pub fn advance<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> TelemetryFrame {
        self.battery_percentage = (self.battery_percentage - self.params.battery_drain_per_tick).clamp(0.0, 100.0);
        let elapsed_seconds = now.saturating_duration_since(self.mission_started_at).as_secs();

        let gps = GpsPoint {
            lat: jitter(rng, BASE_LAT, POSITION_JITTER),
            lon: jitter(rng, BASE_LON, POSITION_JITTER),
        };
        self.record_track_point(gps);

        let current_breeding_site = self.detect_site(rng);
        if let Some(site) = &current_breeding_site {
            self.detected_sites.push(site.clone());
        }

        TelemetryFrame {
            gps,
            altitude: jitter(rng, BASE_ALTITUDE, ALTITUDE_JITTER),
            speed: jitter(rng, BASE_SPEED, SPEED_JITTER),
            roll: jitter(rng, 0.0, ROLL_JITTER),
            pitch: jitter(rng, BASE_PITCH, PITCH_JITTER),
            heading: jitter(rng, BASE_HEADING, HEADING_JITTER),
            signal_strength: SIGNAL_STRENGTH_DBM,
            battery: BatteryStatus {
                voltage: FULL_CHARGE_VOLTAGE * self.battery_percentage / 100.0,
                percentage: self.battery_percentage,
            },
            satellites: SATELLITE_COUNT,
            flight_time: format_flight_time(elapsed_seconds),
            distance_from_home: BASE_DISTANCE_FROM_HOME + elapsed_seconds as f64,
            flight_mode: FlightMode::Loiter,
            armed: self.armed,
            vertical_speed: jitter(rng, BASE_VERTICAL_SPEED, VERTICAL_SPEED_JITTER),
            breeding_site_detected: current_breeding_site.is_some(),
            current_breeding_site,
            detected_sites: self.detected_sites.clone(),
            gps_track: self.gps_track.iter().copied().collect(),
            modes: simulated_modes(),
        }
    }

    fn record_track_point(&mut self, point: GpsPoint) {
        if self.params.max_track_points == 0 {
            return;
        }
        while self.gps_track.len() >= self.params.max_track_points {
            self.gps_track.pop_front();
        }
        self.gps_track.push_back(point);
    }

    fn detect_site<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<BreedingSiteInfo> {
        let probability = self.params.site_detection_probability;
        if probability <= 0.0 || !rng.gen_bool(probability.min(1.0)) {
            return None;
        }
        let (object, site_type) = SITE_OBJECTS[rng.gen_range(0..SITE_OBJECTS.len())];
        let x = rng.gen_range(0.0..0.8);
        let y = rng.gen_range(0.0..0.8);
        let w = rng.gen_range(0.05..0.2);
        let h = rng.gen_range(0.05..0.2);
        Some(BreedingSiteInfo { site_type, object: object.to_string(), bbox: [x, y, w, h] })
    }
}

/// `base ± spread` 范围内的均匀抖动
fn jitter<R: Rng + ?Sized>(rng: &mut R, base: f64, spread: f64) -> f64 {
    base + rng.gen_range(-spread..=spread)
}
