// ground_station/src/event.rs

//! 地面站客户端向界面层发出的事件。
//!
//! 事件通过 `tokio::sync::broadcast` 分发，界面层调用
//! `TelemetryClientService::subscribe_events` 获取接收端。

use common_models::ws_payloads::CommandRejectedPayload;
use serde::Serialize;

/// 遥测连接的生命周期状态。`Closed` 是终态，只有再次调用 `connect` 才会离开。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// 连接状态变更事件的负载。
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct ConnectionStatusEvent {
    /// 当前是否已连接。
    pub connected: bool,
    /// 连接失败或断开的原因；主动断开时为 `None`。
    pub error_message: Option<String>,
}

/// 客户端事件
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(tag = "event", content = "payload")]
pub enum ClientEvent {
    /// 连接建立、断开或连接失败。
    ConnectionStatus(ConnectionStatusEvent),
    /// 指令被拒绝（服务端通知，或本地守卫拦截）。需要展示给操作员。
    CommandRejected(CommandRejectedPayload),
}
