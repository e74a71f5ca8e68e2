// ground_station/src/error.rs

//! 地面站客户端的错误类型。

use common_models::storage::StorageError;
use rust_websocket_utils::error::WsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// 页面地址无法解析
    #[error("无效的页面地址: {0}")]
    InvalidPageUrl(String),

    /// 页面协议既不是 http(s) 也不是 ws(s)
    #[error("不支持的页面协议: {0}")]
    UnsupportedScheme(String),

    /// 指令在本地被拒绝，未发送到服务端
    #[error("{0}")]
    CommandRejected(String),

    /// 当前没有进行中的任务
    #[error("当前没有进行中的任务")]
    NoActiveMission,

    #[error("传输错误: {0}")]
    Transport(#[from] WsError),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
}
