// rust_websocket_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层核心逻辑。
//!
//! 提供建立连接、发送文本帧、接收并过滤控制帧的基础能力。
//! 消息的业务解析（遥测帧 / 控制通知）由上层的连接管理器负责。

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use log::{debug, error, info};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::Message, Error as TungsteniteError},
    WebSocketStream,
};
use url::Url;

use crate::error::WsError;

/// 可能经过 TLS 加密的 TCP WebSocket 流，`connect_async` 成功后返回的类型。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 一个活动的客户端 WebSocket 连接，已拆分为发送端与接收端。
pub struct ClientConnection {
    /// 发送端。上层通常会把它移交给连接管理器独占持有。
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    /// 接收端，配合 [`receive_text`] 在循环中使用。
    pub ws_receiver: SplitStream<ClientWsStream>,
}

impl ClientConnection {
    /// 发送一条文本帧。
    pub async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        send_text(&mut self.ws_sender, text).await
    }
}

/// 通过给定的发送端发送一条文本帧。
pub async fn send_text(ws_sender: &mut SplitSink<ClientWsStream, Message>, text: String) -> Result<(), WsError> {
    debug!("客户端：准备发送文本帧: {}", text);
    ws_sender.send(Message::Text(text)).await?;
    Ok(())
}

/// 连接到指定的 WebSocket 服务器。只接受 `ws` / `wss` 协议。
pub async fn connect_client(url: &Url) -> Result<ClientConnection, WsError> {
    if url.scheme() != "ws" && url.scheme() != "wss" {
        return Err(WsError::InvalidUrl(format!("不支持的协议 '{}': {}", url.scheme(), url)));
    }
    info!("客户端：开始尝试连接到 WebSocket 服务器，URL: {}", url);

    match connect_async(url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("客户端：已成功连接到 {} (HTTP 状态码: {})", url, response.status());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("客户端：连接到 {} 失败，错误: {}", url, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// 从接收端读取下一条文本帧。
///
/// Ping / Pong / 原始帧会被跳过（Pong 由底层库自动回复）。
/// - `Some(Ok(text))`：收到一条文本帧；
/// - `Some(Err(e))`：收到二进制帧或发生底层错误；
/// - `None`：连接已关闭。
pub async fn receive_text(ws_receiver: &mut SplitStream<ClientWsStream>) -> Option<Result<String, WsError>> {
    loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => break Some(Ok(text)),
            Some(Ok(Message::Binary(bin))) => {
                debug!("客户端：收到二进制消息，长度: {} 字节", bin.len());
                break Some(Err(WsError::Message("客户端收到了非预期的 WebSocket 二进制消息".to_string())));
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => continue,
            Some(Ok(Message::Close(close_frame))) => {
                debug!("客户端：收到 Close 控制帧，详细信息: {:?}", close_frame);
                break None;
            }
            Some(Err(TungsteniteError::ConnectionClosed)) | Some(Err(TungsteniteError::AlreadyClosed)) => {
                debug!("客户端：连接已关闭 (ConnectionClosed / AlreadyClosed)。");
                break None;
            }
            Some(Err(e)) => {
                error!("客户端：从 WebSocket 流接收消息时发生底层错误: {}", e);
                break Some(Err(WsError::WebSocketProtocolError(e)));
            }
            None => {
                debug!("客户端：WebSocket 接收流已结束。");
                break None;
            }
        }
    }
}
