// gcs_server/src/ws_server/service.rs

//! 遥测服务的 HTTP / WebSocket 入口。
//!
//! 每个升级成功的 WebSocket 连接被拆成三部分：
//! - 读任务：把对端发来的文本帧送入会话的入站通道；
//! - 写任务：把会话出站通道中的文本写回对端；
//! - 会话本身（`ClientSession::run`）：在当前任务中运行，结束后从注册表移除。

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::connection_manager::ConnectionManager;
use crate::api;
use crate::config::AppConfig;

/// 出站队列容量。写任务跟不上时，多出来的帧被会话直接丢弃。
const OUTBOUND_QUEUE_CAPACITY: usize = 32;
/// 入站队列容量。
const INBOUND_QUEUE_CAPACITY: usize = 32;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub connection_manager: Arc<ConnectionManager>,
    pub telemetry_path: String,
}

/// 遥测服务，封装配置和会话注册表。
pub struct WsService {
    config: AppConfig,
    connection_manager: Arc<ConnectionManager>,
}

impl WsService {
    pub fn new(config: AppConfig, connection_manager: Arc<ConnectionManager>) -> Self {
        info!("[WsService] New instance created.");
        Self { config, connection_manager }
    }

    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.connection_manager
    }

    /// 构建路由：`GET /` 返回 API 描述，遥测路径上升级为 WebSocket。
    pub fn router(&self) -> Router {
        let state = AppState {
            connection_manager: Arc::clone(&self.connection_manager),
            telemetry_path: self.config.server.telemetry_path.clone(),
        };
        Router::new()
            .route("/", get(api::root_handler))
            .route(&self.config.server.telemetry_path, get(telemetry_ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// 绑定配置中的地址并运行，直到收到 Ctrl-C。
    pub async fn start(&self) -> Result<()> {
        let listen_addr = self.config.listen_addr();
        info!("[WsService] Starting telemetry service on {} ...", listen_addr);
        let listener = TcpListener::bind(&listen_addr)
            .await
            .with_context(|| format!("无法绑定监听地址 {}", listen_addr))?;

        let connection_manager = Arc::clone(&self.connection_manager);
        let shutdown = async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("[WsService] 监听 Ctrl-C 信号失败: {}", e);
                return;
            }
            info!("[WsService] 收到 Ctrl-C，正在关闭所有遥测会话...");
            connection_manager.close_all();
        };

        self.serve_on(listener, shutdown).await
    }

    /// 在给定的监听器上运行服务，`shutdown` 完成后停止接受新连接。
    pub async fn serve_on<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr().context("无法读取监听地址")?;
        info!(
            "[WsService] Listening on {} (telemetry path: {})",
            local_addr, self.config.server.telemetry_path
        );

        axum::serve(listener, self.router().into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await
            .context("遥测服务运行失败")?;

        info!("[WsService] Telemetry service stopped.");
        Ok(())
    }
}

async fn telemetry_ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    debug!("[WsService] 来自 {} 的 WebSocket 升级请求", addr);
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state.connection_manager))
}

/// 驱动一个已升级的遥测连接，直到会话关闭。
pub async fn handle_socket(socket: WebSocket, addr: SocketAddr, connection_manager: Arc<ConnectionManager>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(INBOUND_QUEUE_CAPACITY);
    let (writer_stop_tx, mut writer_stop_rx) = oneshot::channel::<()>();

    let (session, close_signal) = connection_manager.open_session(addr, outbound_tx);
    let session_id = session.session_id;

    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = &mut writer_stop_rx => break,
                maybe_text = outbound_rx.recv() => {
                    let Some(text) = maybe_text else { break };
                    if let Err(e) = ws_sender.send(Message::Text(text)).await {
                        warn!("[SenderTask {}] 写入 WebSocket 失败，连接可能已断开: {}", session_id, e);
                        break;
                    }
                }
            }
        }
        // 会话结束后排队中的消息不再发送
        drop(outbound_rx);
        if let Err(e) = ws_sender.close().await {
            debug!("[SenderTask {}] 发送 Close 帧失败: {}", session_id, e);
        }
        debug!("[SenderTask {}] Loop exited, sender task fully ended.", session_id);
    });

    let reader = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Binary(bin)) => {
                    warn!("[ReceiverTask {}] 忽略 {} 字节的二进制消息", session_id, bin.len());
                }
                Ok(Message::Close(frame)) => {
                    debug!("[ReceiverTask {}] 收到 Close 帧: {:?}", session_id, frame);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Err(e) => {
                    warn!("[ReceiverTask {}] WebSocket 协议错误: {}", session_id, e);
                    break;
                }
            }
        }
    });

    let reason = session.run(inbound_rx, close_signal).await;

    let _ = writer_stop_tx.send(());
    reader.abort();
    if let Err(e) = writer.await {
        error!("[WsService] Session {}: Sender task panicked or was cancelled: {:?}", session_id, e);
    }
    connection_manager.remove_session(&session_id);
    info!("[WsService] Session {} ({}) cleanup finished, reason: {}", session_id, addr, reason);
}
