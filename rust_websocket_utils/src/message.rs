// rust_websocket_utils/src/message.rs

//! 定义遥测通道上使用的消息结构与编解码。
//!
//! 通道上有两种文本消息：
//! - `{ "type": ..., "payload": ... }` 形状的类型化消息 (`TypedMessage`)，
//!   上行的操作员指令和下行的控制通知都使用这种形状；
//! - 下行的遥测帧，直接是一个 `TelemetryFrame` JSON 对象，没有外层信封。
//!
//! 下行文本按以下规则区分：顶层是带字符串 `type` 字段的 JSON 对象时视为类型化消息，
//! 否则按遥测帧解析。

use common_models::telemetry::TelemetryFrame;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::WsError;

/// `{ type, payload }` 形状的类型化消息。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TypedMessage {
    /// 消息业务类型，例如 `"SET_ARM"`、`"COMMAND_REJECTED"`。
    /// 接收方根据此字段决定如何解释 `payload`。
    #[serde(rename = "type")]
    pub message_type: String,

    /// 消息负载。缺省时为 `null`。
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TypedMessage {
    /// 用任意可序列化的负载构造一条类型化消息。
    pub fn new<T: Serialize>(message_type: &str, payload_data: &T) -> Result<TypedMessage, WsError> {
        let payload = serde_json::to_value(payload_data)
            .map_err(|e| WsError::SerializationError(format!("序列化 {} 消息载荷失败: {}", message_type, e)))?;
        Ok(TypedMessage { message_type: message_type.to_string(), payload })
    }

    /// 从一条文本帧解析类型化消息。缺少 `type` 字段或不是 JSON 对象时返回反序列化错误。
    pub fn from_text(text: &str) -> Result<TypedMessage, WsError> {
        serde_json::from_str(text).map_err(|e| {
            WsError::DeserializationError(format!("文本解析为类型化消息失败: {}, 原始文本: '{}'", e, text))
        })
    }

    /// 将负载反序列化为目标类型 `T`。
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, WsError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            WsError::DeserializationError(format!(
                "{} 消息载荷反序列化为目标类型失败: {}, 原始载荷: '{}'",
                self.message_type, e, self.payload
            ))
        })
    }

    /// 编码为一条文本帧。
    pub fn to_text(&self) -> Result<String, WsError> {
        encode_json(self)
    }
}

/// 将任意可序列化的值编码为一条文本帧。
pub fn encode_json<T: Serialize>(value: &T) -> Result<String, WsError> {
    serde_json::to_string(value).map_err(|e| WsError::SerializationError(format!("编码 JSON 文本失败: {}", e)))
}

/// 服务端下发的一条消息。
#[derive(Debug, Clone, PartialEq)]
pub enum DownstreamMessage {
    /// 遥测帧。
    Telemetry(Box<TelemetryFrame>),
    /// 控制通知，例如指令被拒绝。
    Notice(TypedMessage),
}

impl DownstreamMessage {
    /// 解码一条下行文本帧。
    pub fn decode(text: &str) -> Result<DownstreamMessage, WsError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| WsError::DeserializationError(format!("下行文本不是合法 JSON: {}, 原始文本: '{}'", e, text)))?;

        let is_notice = value.get("type").map(serde_json::Value::is_string).unwrap_or(false);
        if is_notice {
            let notice: TypedMessage = serde_json::from_value(value)
                .map_err(|e| WsError::DeserializationError(format!("控制通知解析失败: {}", e)))?;
            return Ok(DownstreamMessage::Notice(notice));
        }

        let frame: TelemetryFrame = serde_json::from_value(value)
            .map_err(|e| WsError::DeserializationError(format!("遥测帧解析失败: {}, 原始文本: '{}'", e, text)))?;
        Ok(DownstreamMessage::Telemetry(Box::new(frame)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_models::ws_payloads::{
        Command, CommandRejectedPayload, COMMAND_REJECTED_MESSAGE_TYPE, SET_ARM_MESSAGE_TYPE,
    };

    #[test]
    /// 由 `TypedMessage::new` 构造的指令与 `Command` 自身的序列化结果完全一致。
    fn test_typed_message_matches_command_wire_shape() {
        let message = TypedMessage::new(SET_ARM_MESSAGE_TYPE, &true).expect("构造 SET_ARM 消息失败");
        let from_command = encode_json(&Command::SetArm(true)).unwrap();
        assert_eq!(message, TypedMessage::from_text(&from_command).unwrap());
        assert_eq!(message.deserialize_payload::<bool>().unwrap(), true);
    }

    #[test]
    fn test_missing_type_is_deserialization_error() {
        let result = TypedMessage::from_text(r#"{"payload": true}"#);
        match result {
            Err(WsError::DeserializationError(details)) => assert!(details.contains("type")),
            other => panic!("预期 DeserializationError，实际为 {:?}", other),
        }
    }

    #[test]
    fn test_payload_type_mismatch() {
        let message = TypedMessage::from_text(r#"{"type":"SET_ARM","payload":"yes"}"#).unwrap();
        assert!(matches!(message.deserialize_payload::<bool>(), Err(WsError::DeserializationError(_))));
    }

    #[test]
    fn test_downstream_decodes_frame_and_notice() {
        let frame = TelemetryFrame { armed: true, satellites: 9, ..TelemetryFrame::default() };
        let frame_text = encode_json(&frame).unwrap();
        match DownstreamMessage::decode(&frame_text).unwrap() {
            DownstreamMessage::Telemetry(decoded) => {
                assert!(decoded.armed);
                assert_eq!(decoded.satellites, 9);
                assert_eq!(decoded.flight_time, "00:00");
            }
            other => panic!("预期遥测帧，实际为 {:?}", other),
        }

        let rejection = CommandRejectedPayload { command: "SET_ARM".to_string(), reason: "no".to_string() };
        let notice_text = TypedMessage::new(COMMAND_REJECTED_MESSAGE_TYPE, &rejection).unwrap().to_text().unwrap();
        match DownstreamMessage::decode(&notice_text).unwrap() {
            DownstreamMessage::Notice(notice) => {
                assert_eq!(notice.message_type, COMMAND_REJECTED_MESSAGE_TYPE);
                assert_eq!(notice.deserialize_payload::<CommandRejectedPayload>().unwrap(), rejection);
            }
            other => panic!("预期控制通知，实际为 {:?}", other),
        }
    }

    #[test]
    fn test_downstream_rejects_garbage() {
        assert!(DownstreamMessage::decode("not json").is_err());
        assert!(DownstreamMessage::decode(r#"{"altitude": 1.0}"#).is_err());
    }
}
