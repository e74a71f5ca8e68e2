// gcs_server/src/ws_server/telemetry_publisher.rs

//! 遥测发布器。
//!
//! 每个会话持有一个发布器，发布器独占一份 `VehicleSimState` 和自己的随机源。
//! 发布节拍由会话循环驱动：会话在每个节拍调用 `publish_next`，
//! 得到编码好的文本后再尝试写入出站通道。推进状态与发送是分开的两步。

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_websocket_utils::error::WsError;
use rust_websocket_utils::message::encode_json;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use common_models::telemetry::TelemetryFrame;

use crate::vehicle_sim::{SimulationParams, VehicleSimState};

/// 单个连接的遥测发布器
#[derive(Debug)]
pub struct TelemetryPublisher {
    sim: VehicleSimState,
    rng: StdRng,
    period: Duration,
    frames_published: u64,
}

impl TelemetryPublisher {
    /// 以全新的模拟状态（满量程电量、未解锁）创建发布器。
    pub fn new(params: SimulationParams, period: Duration) -> Self {
        Self::with_rng(params, period, StdRng::from_entropy())
    }

    /// 使用指定随机源创建发布器，测试中用固定种子。
    pub fn with_rng(params: SimulationParams, period: Duration, rng: StdRng) -> Self {
        Self { sim: VehicleSimState::new(params, Instant::now()), rng, period, frames_published: 0 }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn sim(&self) -> &VehicleSimState {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut VehicleSimState {
        &mut self.sim
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    /// 创建发布节拍：第一个节拍在一个周期之后触发，错过的节拍直接跳过，不补发。
    pub fn cadence(&self) -> Interval {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    /// 推进一个周期，返回新帧。
    pub fn next_frame(&mut self, now: Instant) -> TelemetryFrame {
        let frame = self.sim.advance(now, &mut self.rng);
        self.frames_published += 1;
        frame
    }

    /// 推进一个周期并编码为文本帧。
    pub fn publish_next(&mut self, now: Instant) -> Result<String, WsError> {
        let frame = self.next_frame(now);
        debug!(
            "[遥测发布器] 第 {} 帧: battery={:.2}%, armed={}, flightTime={}",
            self.frames_published, frame.battery.percentage, frame.armed, frame.flight_time
        );
        encode_json(&frame)
    }
}
