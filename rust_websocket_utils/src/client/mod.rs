// rust_websocket_utils/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! `transport` 子模块封装 `tokio-tungstenite` 的连接建立、文本帧收发与控制帧过滤，
//! 供地面站的遥测连接管理器使用。

pub mod transport;
