//! `gcs_server` 地面站遥测服务端核心库。
//!
//! 每个遥测连接对应一个会话，会话独占一架模拟飞行器，按固定周期下发遥测帧，
//! 并处理操作员的解锁 / 上锁指令。
//!
//! 主要模块包括：
//! - `api`: 根路径的 HTTP API 描述。
//! - `config`: 配置文件的加载与默认值。
//! - `error`: 应用级错误类型。
//! - `storage_probe`: 启动时的存储连通性检查。
//! - `vehicle_sim`: 模拟飞行器的状态与推进规则（不做 I/O）。
//! - `ws_server`: 遥测发布器、会话、指令路由、会话注册表与 axum 服务。

pub mod api;
pub mod config;
pub mod error;
pub mod storage_probe;
pub mod vehicle_sim;
pub mod ws_server;
