// common_models/src/ws_payloads.rs

//! 遥测通道上使用的消息类型常量与 Payload 结构体。
//!
//! 上行（客户端 → 服务端）只有操作员指令，形如 `{ "type": "SET_ARM", "payload": true }`。
//! 下行（服务端 → 客户端）除了遥测帧本身之外，还有同样是 `{type, payload}` 形状的控制通知，
//! 目前只有指令被拒绝的通知。

use serde::{Deserialize, Serialize};

/// 解锁 / 上锁指令的消息类型。
pub const SET_ARM_MESSAGE_TYPE: &str = "SET_ARM";
/// 指令被拒绝的下行通知类型。
pub const COMMAND_REJECTED_MESSAGE_TYPE: &str = "COMMAND_REJECTED";

/// 任务进行中请求上锁时返回给操作员的拒绝原因。
pub const DISARM_DURING_MISSION_REASON: &str =
    "Cannot disarm while a mission is active. Please end the mission first.";

/// 操作员指令。
///
/// 序列化为 `{ "type": <kind>, "payload": <payload> }`。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    /// `true` 为解锁（arm），`false` 为上锁（disarm）。
    #[serde(rename = "SET_ARM")]
    SetArm(bool),
}

impl Command {
    /// 指令在线上的 `type` 字段值。
    pub fn message_type(&self) -> &'static str {
        match self {
            Command::SetArm(_) => SET_ARM_MESSAGE_TYPE,
        }
    }
}

/// `COMMAND_REJECTED` 通知的负载。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommandRejectedPayload {
    /// 被拒绝指令的 `type`。
    pub command: String,
    /// 面向操作员的拒绝原因。
    pub reason: String,
}
