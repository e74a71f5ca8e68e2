//! `rust_websocket_utils` 是一个提供 WebSocket 通信实用功能的 Rust Crate。
//!
//! 主要模块包括：
//! - `message`: 通道上的 `{type, payload}` 类型化消息与下行消息解码。
//! - `error`: 库中使用的统一错误类型 `WsError`。
//! - `client`: WebSocket 客户端传输层。

pub mod client;
pub mod error;
pub mod message;
