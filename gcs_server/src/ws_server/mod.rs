// gcs_server/src/ws_server/mod.rs

//! 遥测 WebSocket 服务端逻辑模块。

pub mod client_session;
pub mod command_router;
pub mod connection_manager;
pub mod mission_activity;
pub mod service;
pub mod telemetry_publisher;
