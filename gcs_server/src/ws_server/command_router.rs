// gcs_server/src/ws_server/command_router.rs

//! 负责解码客户端上行的指令文本，并在任务活动上下文中校验、执行指令。
//!
//! 指令的副作用只有两种：修改会话自己的 `VehicleSimState`，或产生一条拒绝结果。
//! 拒绝结果由会话编码为 `COMMAND_REJECTED` 通知回送给发出指令的客户端，连接保持打开。

use common_models::ws_payloads::{
    Command, CommandRejectedPayload, COMMAND_REJECTED_MESSAGE_TYPE, DISARM_DURING_MISSION_REASON,
    SET_ARM_MESSAGE_TYPE,
};
use log::{debug, info};
use rust_websocket_utils::error::WsError;
use rust_websocket_utils::message::TypedMessage;
use thiserror::Error;

use crate::vehicle_sim::VehicleSimState;

/// 指令解码失败的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandDecodeError {
    /// 不是合法 JSON、缺少 `type` 字段或负载类型不符
    #[error("无法解析的指令: {0}")]
    Malformed(String),

    /// `type` 字段是未知的指令类型
    #[error("未知的指令类型: {0}")]
    Unknown(String),
}

/// 指令处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    Rejected { reason: String },
}

/// 将一条上行文本帧解码为 `Command`。
pub fn decode_command(text: &str) -> Result<Command, CommandDecodeError> {
    let message = TypedMessage::from_text(text).map_err(|e| CommandDecodeError::Malformed(e.to_string()))?;

    match message.message_type.as_str() {
        SET_ARM_MESSAGE_TYPE => {
            let should_arm: bool = message
                .deserialize_payload()
                .map_err(|e| CommandDecodeError::Malformed(e.to_string()))?;
            Ok(Command::SetArm(should_arm))
        }
        other => Err(CommandDecodeError::Unknown(other.to_string())),
    }
}

/// 在任务活动上下文中执行指令。
///
/// - `SetArm(true)` 总是被接受；
/// - `SetArm(false)` 只在没有进行中的任务时被接受，否则拒绝且 `armed` 保持不变。
pub fn route_command(command: Command, sim: &mut VehicleSimState, mission_active: bool) -> CommandOutcome {
    match command {
        Command::SetArm(true) => {
            sim.set_armed(true);
            info!("[指令路由] SET_ARM(true) 已接受，飞行器已解锁。");
            CommandOutcome::Accepted
        }
        Command::SetArm(false) if mission_active => {
            info!("[指令路由] SET_ARM(false) 被拒绝：任务进行中。");
            CommandOutcome::Rejected { reason: DISARM_DURING_MISSION_REASON.to_string() }
        }
        Command::SetArm(false) => {
            sim.set_armed(false);
            info!("[指令路由] SET_ARM(false) 已接受，飞行器已上锁。");
            CommandOutcome::Accepted
        }
    }
}

/// 编码一条 `COMMAND_REJECTED` 下行通知。
pub fn rejection_notice(command: &Command, reason: &str) -> Result<String, WsError> {
    let payload = CommandRejectedPayload { command: command.message_type().to_string(), reason: reason.to_string() };
    debug!("[指令路由] 生成拒绝通知: {:?}", payload);
    TypedMessage::new(COMMAND_REJECTED_MESSAGE_TYPE, &payload)?.to_text()
}
