// ground_station/src/ws_client/mod.rs

//! 遥测 WebSocket 客户端模块。

pub mod service;

pub use service::TelemetryClientService;
