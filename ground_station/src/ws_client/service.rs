// ground_station/src/ws_client/service.rs

//! 地面站的遥测连接管理器。
//!
//! 负责与 `gcs_server` 的遥测 WebSocket 连接：建立连接、接收并缓存最新遥测帧、
//! 发送操作员指令，以及按重连策略处理断开（默认不重连）。
//!
//! 最新帧缓存只会被整体覆盖，不会与旧帧合并；解码失败时缓存保持不变。

use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use log::{debug, error, info, warn};
use rust_websocket_utils::client::transport::{self, ClientWsStream};
use rust_websocket_utils::error::WsError;
use rust_websocket_utils::message::{encode_json, DownstreamMessage, TypedMessage};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;
use url::Url;

use common_models::telemetry::TelemetryFrame;
use common_models::ws_payloads::{
    Command, CommandRejectedPayload, COMMAND_REJECTED_MESSAGE_TYPE, DISARM_DURING_MISSION_REASON,
};
use common_models::RetryPolicy;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::event::{ClientEvent, ConnectionState, ConnectionStatusEvent};

/// 事件广播通道容量
const EVENT_CHANNEL_CAPACITY: usize = 64;

type WsSink = SplitSink<ClientWsStream, TungsteniteMessage>;

/// 遥测连接管理器。
///
/// 独占出站连接句柄和最新帧缓存。
pub struct TelemetryClientService {
    endpoint: Url,
    reconnect: RetryPolicy,
    /// WebSocket 发送端。`None` 表示当前没有打开的连接。
    ws_send_channel: Arc<TokioMutex<Option<WsSink>>>,
    /// 最近一次收到的遥测帧。
    latest_frame: Arc<RwLock<Option<TelemetryFrame>>>,
    status_tx: Arc<watch::Sender<ConnectionState>>,
    events_tx: broadcast::Sender<ClientEvent>,
    /// 连接处理任务的句柄。只在同步代码中短暂加锁，`Drop` 时可以直接取出。
    connection_task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryClientService {
    /// 创建连接管理器，但不发起连接。
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let endpoint = config.telemetry_endpoint()?;
        info!("[遥测客户端] 初始化，遥测端点: {}，重连策略: {:?}", endpoint, config.reconnect);
        let (status_tx, _) = watch::channel(ConnectionState::Idle);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            endpoint,
            reconnect: config.reconnect,
            ws_send_channel: Arc::new(TokioMutex::new(None)),
            latest_frame: Arc::new(RwLock::new(None)),
            status_tx: Arc::new(status_tx),
            events_tx,
            connection_task_handle: Mutex::new(None),
        })
    }

    /// 创建连接管理器并立即发起一次连接。
    pub async fn open(config: &ClientConfig) -> Result<Self, ClientError> {
        let service = Self::new(config)?;
        service.connect().await;
        Ok(service)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.status_tx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// 订阅连接状态变化。
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.status_tx.subscribe()
    }

    /// 订阅客户端事件。
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events_tx.subscribe()
    }

    /// 最近一次收到的遥测帧，尚未收到任何帧时为 `None`。
    pub async fn latest_frame(&self) -> Option<TelemetryFrame> {
        self.latest_frame.read().await.clone()
    }

    /// 供界面展示的遥测帧：尚未收到任何帧时返回默认帧。
    pub async fn display_frame(&self) -> TelemetryFrame {
        self.latest_frame().await.unwrap_or_default()
    }

    /// 启动后台连接任务。已有连接任务时先将其取消。
    ///
    /// 连接结果通过 `ConnectionState` 和 `ClientEvent::ConnectionStatus` 异步通知。
    pub async fn connect(&self) {
        info!("[遥测客户端] connect 调用，目标: {}", self.endpoint);

        let previous_task = self.connection_task().take();
        if let Some(handle) = previous_task {
            info!("[遥测客户端] 检测到之前的连接任务正在运行，正在尝试取消...");
            handle.abort();
            match handle.await {
                Ok(_) => info!("[遥测客户端] 之前的连接任务已完成。"),
                Err(e) if e.is_cancelled() => info!("[遥测客户端] 之前的连接任务已被取消。"),
                Err(e) => warn!("[遥测客户端] 等待之前的连接任务结束时发生错误: {:?}", e),
            }
            *self.ws_send_channel.lock().await = None;
        }

        self.status_tx.send_replace(ConnectionState::Connecting);
        let task = tokio::spawn(Self::run_connection_loop(
            self.endpoint.clone(),
            self.reconnect,
            Arc::clone(&self.ws_send_channel),
            Arc::clone(&self.latest_frame),
            Arc::clone(&self.status_tx),
            self.events_tx.clone(),
        ));
        if let Some(concurrent) = self.connection_task().replace(task) {
            warn!("[遥测客户端] 并发的 connect 调用，较早的连接任务已取消。");
            concurrent.abort();
        }
    }

    fn connection_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.connection_task_handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 连接任务：连接、接收，直到连接结束且重连预算耗尽。
    ///
    /// 一次 `connect` 调用内的每次断开（连接失败或已建立的连接被关闭）都计入重连预算，
    /// 握手成功不清零，总连接尝试次数不超过 `max_retries + 1`。
    async fn run_connection_loop(
        endpoint: Url,
        reconnect: RetryPolicy,
        ws_send_channel: Arc<TokioMutex<Option<WsSink>>>,
        latest_frame: Arc<RwLock<Option<TelemetryFrame>>>,
        status_tx: Arc<watch::Sender<ConnectionState>>,
        events_tx: broadcast::Sender<ClientEvent>,
    ) {
        let mut attempts_used: u32 = 0;
        let final_error_message = loop {
            status_tx.send_replace(ConnectionState::Connecting);
            let error_message = match transport::connect_client(&endpoint).await {
                Ok(mut client_connection) => {
                    info!("[遥测客户端] (连接任务) 连接成功建立。");
                    *ws_send_channel.lock().await = Some(client_connection.ws_sender);
                    status_tx.send_replace(ConnectionState::Open);
                    emit(&events_tx, ClientEvent::ConnectionStatus(ConnectionStatusEvent { connected: true, error_message: None }));

                    let reason = Self::receive_loop(&mut client_connection.ws_receiver, &latest_frame, &events_tx).await;
                    *ws_send_channel.lock().await = None;
                    reason
                }
                Err(e) => {
                    error!("[遥测客户端] (连接任务) 连接到 {} 失败: {}", endpoint, e);
                    format!("连接到遥测服务失败: {}", e)
                }
            };

            attempts_used += 1;
            if !reconnect.should_retry(attempts_used) {
                break error_message;
            }
            warn!(
                "[遥测客户端] (连接任务) {}；{:?} 后进行第 {}/{} 次重连。",
                error_message,
                reconnect.backoff(),
                attempts_used,
                reconnect.max_retries
            );
            status_tx.send_replace(ConnectionState::Connecting);
            tokio::time::sleep(reconnect.backoff()).await;
        };

        info!("[遥测客户端] (连接任务) 连接已结束，不再重连: {}", final_error_message);
        status_tx.send_replace(ConnectionState::Closed);
        emit(
            &events_tx,
            ClientEvent::ConnectionStatus(ConnectionStatusEvent { connected: false, error_message: Some(final_error_message) }),
        );
    }

    /// 接收循环，返回连接结束的原因。
    async fn receive_loop(
        ws_receiver: &mut futures_util::stream::SplitStream<ClientWsStream>,
        latest_frame: &RwLock<Option<TelemetryFrame>>,
        events_tx: &broadcast::Sender<ClientEvent>,
    ) -> String {
        loop {
            match transport::receive_text(ws_receiver).await {
                Some(Ok(text)) => Self::process_received_message(&text, latest_frame, events_tx).await,
                Some(Err(WsError::Message(details))) => {
                    warn!("[遥测客户端] (连接任务) 忽略非文本消息: {}", details);
                }
                Some(Err(e)) => {
                    error!("[遥测客户端] (连接任务) 接收消息时发生错误: {}", e);
                    break format!("接收遥测时发生错误: {}", e);
                }
                None => {
                    info!("[遥测客户端] (连接任务) 遥测连接已由服务端关闭。");
                    break "遥测连接已由服务端关闭".to_string();
                }
            }
        }
    }

    /// 处理一条下行文本：遥测帧覆盖缓存，控制通知转为事件。解码失败时缓存不变。
    pub async fn process_received_message(
        text: &str,
        latest_frame: &RwLock<Option<TelemetryFrame>>,
        events_tx: &broadcast::Sender<ClientEvent>,
    ) {
        match DownstreamMessage::decode(text) {
            Ok(DownstreamMessage::Telemetry(frame)) => {
                debug!(
                    "[遥测客户端] 收到遥测帧: flightTime={}, battery={:.2}%, armed={}",
                    frame.flight_time, frame.battery.percentage, frame.armed
                );
                *latest_frame.write().await = Some(*frame);
            }
            Ok(DownstreamMessage::Notice(notice)) => Self::process_notice(notice, events_tx),
            Err(e) => {
                warn!("[遥测客户端] 丢弃无法解析的下行消息: {}", e);
            }
        }
    }

    fn process_notice(notice: TypedMessage, events_tx: &broadcast::Sender<ClientEvent>) {
        match notice.message_type.as_str() {
            COMMAND_REJECTED_MESSAGE_TYPE => match notice.deserialize_payload::<CommandRejectedPayload>() {
                Ok(payload) => {
                    warn!("[遥测客户端] 指令 {} 被服务端拒绝: {}", payload.command, payload.reason);
                    emit(events_tx, ClientEvent::CommandRejected(payload));
                }
                Err(e) => warn!("[遥测客户端] 拒绝通知的负载无法解析: {}", e),
            },
            other => warn!("[遥测客户端] 忽略未知类型的控制通知: {}", other),
        }
    }

    /// 发送一条指令。
    ///
    /// 连接未打开时只记录警告并返回 `Ok(false)`，不算错误；发送不等待任何确认。
    /// 编码或写入失败时返回 `ClientError::Transport`。
    pub async fn send_command(&self, command: Command) -> Result<bool, ClientError> {
        let mut sender_guard = self.ws_send_channel.lock().await;
        let Some(ws_sender) = sender_guard.as_mut() else {
            warn!("[遥测客户端] 连接未打开，忽略指令 {:?}", command);
            return Ok(false);
        };

        let text = encode_json(&command)?;
        if let Err(e) = transport::send_text(ws_sender, text).await {
            warn!("[遥测客户端] 发送指令 {:?} 失败: {}", command, e);
            return Err(e.into());
        }
        debug!("[遥测客户端] 指令 {:?} 已发送。", command);
        Ok(true)
    }

    /// 解锁 / 上锁。任务进行中请求上锁时在本地拒绝，不发送任何消息。
    pub async fn set_armed(&self, should_arm: bool, mission_active: bool) -> Result<bool, ClientError> {
        if !should_arm && mission_active {
            let payload = CommandRejectedPayload {
                command: Command::SetArm(false).message_type().to_string(),
                reason: DISARM_DURING_MISSION_REASON.to_string(),
            };
            warn!("[遥测客户端] 本地拒绝上锁: {}", payload.reason);
            emit(&self.events_tx, ClientEvent::CommandRejected(payload));
            return Err(ClientError::CommandRejected(DISARM_DURING_MISSION_REASON.to_string()));
        }
        self.send_command(Command::SetArm(should_arm)).await
    }

    /// 主动断开连接并停止连接任务。
    pub async fn disconnect(&self) {
        info!("[遥测客户端] disconnect 调用。");
        let task = self.connection_task().take();
        if let Some(handle) = task {
            handle.abort();
            let _ = handle.await;
        }
        if let Some(mut ws_sender) = self.ws_send_channel.lock().await.take() {
            if let Err(e) = ws_sender.close().await {
                debug!("[遥测客户端] 关闭发送端时出错: {}", e);
            }
        }
        let previous = self.status_tx.send_replace(ConnectionState::Closed);
        if previous != ConnectionState::Closed {
            emit(&self.events_tx, ClientEvent::ConnectionStatus(ConnectionStatusEvent { connected: false, error_message: None }));
        }
    }
}

impl std::fmt::Debug for TelemetryClientService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClientService")
            .field("endpoint", &self.endpoint.as_str())
            .field("reconnect", &self.reconnect)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for TelemetryClientService {
    fn drop(&mut self) {
        let task = self.connection_task_handle.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = task {
            handle.abort();
        }
    }
}

fn emit(events_tx: &broadcast::Sender<ClientEvent>, event: ClientEvent) {
    // 没有订阅者时发送失败是正常情况
    if events_tx.send(event).is_err() {
        debug!("[遥测客户端] 当前没有事件订阅者。");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_models::telemetry::GpsPoint;

    fn frame(flight_time: &str, armed: bool) -> TelemetryFrame {
        TelemetryFrame {
            flight_time: flight_time.to_string(),
            armed,
            gps_track: vec![GpsPoint { lat: 1.0, lon: 2.0 }],
            ..TelemetryFrame::default()
        }
    }

    #[tokio::test]
    /// 后到的帧整体覆盖先到的帧。
    async fn test_cache_holds_exactly_latest_frame() {
        let cache = RwLock::new(None);
        let (events_tx, _) = broadcast::channel(4);
        let f1 = frame("00:01", true);
        let f2 = TelemetryFrame { gps_track: Vec::new(), ..frame("00:02", false) };

        TelemetryClientService::process_received_message(&encode_json(&f1).unwrap(), &cache, &events_tx).await;
        TelemetryClientService::process_received_message(&encode_json(&f2).unwrap(), &cache, &events_tx).await;

        let cached = cache.read().await.clone().unwrap();
        assert_eq!(cached.flight_time, "00:02");
        assert!(!cached.armed);
        assert!(cached.gps_track.is_empty(), "不应与旧帧合并");
    }

    #[tokio::test]
    async fn test_malformed_message_leaves_cache_unchanged() {
        let cache = RwLock::new(None);
        let (events_tx, _) = broadcast::channel(4);
        TelemetryClientService::process_received_message(&encode_json(&frame("00:07", true)).unwrap(), &cache, &events_tx)
            .await;
        TelemetryClientService::process_received_message("{ broken", &cache, &events_tx).await;
        TelemetryClientService::process_received_message(r#"{"altitude": 3.0}"#, &cache, &events_tx).await;

        assert_eq!(cache.read().await.as_ref().unwrap().flight_time, "00:07");
    }

    #[tokio::test]
    async fn test_rejection_notice_becomes_event() {
        let cache = RwLock::new(None);
        let (events_tx, mut events_rx) = broadcast::channel(4);
        let notice = TypedMessage::new(
            COMMAND_REJECTED_MESSAGE_TYPE,
            &CommandRejectedPayload { command: "SET_ARM".to_string(), reason: DISARM_DURING_MISSION_REASON.to_string() },
        )
        .unwrap()
        .to_text()
        .unwrap();

        TelemetryClientService::process_received_message(&notice, &cache, &events_tx).await;
        match events_rx.try_recv().unwrap() {
            ClientEvent::CommandRejected(payload) => assert_eq!(payload.reason, DISARM_DURING_MISSION_REASON),
            other => panic!("预期 CommandRejected，实际为 {:?}", other),
        }
        assert!(cache.read().await.is_none());
    }

    #[tokio::test]
    /// 未连接时发送指令是无操作。
    async fn test_send_command_when_not_open_is_noop() {
        let service = TelemetryClientService::new(&ClientConfig::default()).unwrap();
        assert_eq!(service.state(), ConnectionState::Idle);
        assert!(!service.send_command(Command::SetArm(true)).await.unwrap());
        assert_eq!(service.display_frame().await, TelemetryFrame::default());
    }

    #[tokio::test]
    async fn test_local_disarm_guard() {
        let service = TelemetryClientService::new(&ClientConfig::default()).unwrap();
        let mut events = service.subscribe_events();

        match service.set_armed(false, true).await {
            Err(ClientError::CommandRejected(reason)) => assert_eq!(reason, DISARM_DURING_MISSION_REASON),
            other => panic!("预期本地拒绝，实际为 {:?}", other),
        }
        assert!(matches!(events.try_recv(), Ok(ClientEvent::CommandRejected(_))));

        // 没有任务时上锁会尝试发送，但连接未打开
        assert!(!service.set_armed(false, false).await.unwrap());
    }

    #[tokio::test]
    /// 服务不可达且不重连时，连接进入 Closed 终态并发出断开事件。
    async fn test_unreachable_endpoint_ends_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::for_page(format!("http://{}/", addr));
        let service = TelemetryClientService::new(&config).unwrap();
        let mut events = service.subscribe_events();
        let mut state = service.watch_state();
        service.connect().await;

        tokio::time::timeout(std::time::Duration::from_secs(5), state.wait_for(|s| *s == ConnectionState::Closed))
            .await
            .expect("等待 Closed 超时")
            .unwrap();
        match events.recv().await.unwrap() {
            ClientEvent::ConnectionStatus(status) => {
                assert!(!status.connected);
                assert!(status.error_message.is_some());
            }
            other => panic!("预期连接状态事件，实际为 {:?}", other),
        }
    }
}
