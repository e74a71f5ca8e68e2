//! `ground_station` 地面站客户端库。
//!
//! - **遥测连接 (`ws_client`)**: 连接 `gcs_server` 的遥测通道，缓存最新一帧遥测，发送解锁 / 上锁指令。
//! - **任务计时 (`mission_timer`)**: 客户端侧的任务时钟，每秒刷新一次展示值。
//! - **任务流程 (`mission`)**: 开始 / 结束任务，结束时把计时结果和最后一帧遥测保存为任务记录。
//! - **配置 (`config`)**: 页面地址、遥测路径与重连策略，遥测端点由页面协议推导。
//! - **事件 (`event`)**: 发给界面层的连接状态与指令拒绝事件。

pub mod config;
pub mod error;
pub mod event;
pub mod mission;
pub mod mission_timer;
pub mod ws_client;

pub use config::ClientConfig;
pub use error::ClientError;
pub use mission::MissionController;
pub use mission_timer::MissionTimer;
pub use ws_client::TelemetryClientService;
