//! `common_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了地面站各 Rust 组件（遥测服务端 `gcs_server`、地面站客户端
//! `ground_station`）以及前端仪表盘之间共享的数据结构：
//! - **遥测 (`telemetry`)**: 每秒下发一次的 `TelemetryFrame` 及其子结构。
//! - **通道消息负载 (`ws_payloads`)**: 上行指令 `Command` 与下行控制通知的负载。
//! - **任务模型 (`mission_models`)**: 任务记录、飞行统计、任务规划。
//! - **存储边界 (`storage`)**: 任务 / 规划存储协作方的接口与进程内实现。
//! - **通用枚举 (`enums`)**: 飞行模式、任务状态、孳生地类型。
//! - **重试策略 (`retry`)**: 遥测重连与存储连通性检查共用的 `RetryPolicy`。
//!
//! 所有模型都派生 `Serialize` / `Deserialize` / `Debug` / `Clone`，线上字段名与前端保持一致。

pub mod enums;
pub mod mission_models;
pub mod retry;
pub mod storage;
pub mod telemetry;
pub mod ws_payloads;

pub use enums::{FlightMode, MissionStatus, SiteType};
pub use retry::RetryPolicy;
pub use telemetry::{format_flight_time, TelemetryFrame};
pub use ws_payloads::Command;
