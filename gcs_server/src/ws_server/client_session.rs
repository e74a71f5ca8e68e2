// gcs_server/src/ws_server/client_session.rs

//! 单个遥测连接的服务端会话。
//!
//! 生命周期为 `Open` → `Streaming` → `Closed`，`Closed` 是终态。
//! 会话独占一个 `TelemetryPublisher`（以及其中的 `VehicleSimState`）和发布节拍；
//! 所有事件（关闭信号、上行指令、节拍）在同一个 `tokio::select!` 循环中串行处理，
//! 循环退出时节拍和模拟状态随会话一起被释放，之后不会再产生任何帧。

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::fmt;
use std::net::SocketAddr;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

use super::command_router::{decode_command, rejection_notice, route_command, CommandDecodeError, CommandOutcome};
use super::mission_activity::MissionActivity;
use super::telemetry_publisher::TelemetryPublisher;

/// 会话生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Streaming,
    Closed,
}

/// 会话进入 `Closed` 的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// 对端关闭连接（入站通道结束）
    PeerClosed,
    /// 服务端主动关闭（注册表发出关闭信号，或信号发送端被丢弃）
    LocalClose,
    /// 出站目标已不可写
    SendTargetClosed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CloseReason::PeerClosed => "对端关闭",
            CloseReason::LocalClose => "本地关闭",
            CloseReason::SendTargetClosed => "发送目标已关闭",
        };
        f.write_str(text)
    }
}

/// 代表一个已接受的遥测连接。
///
/// 出站方向是一个有界的 `mpsc::Sender<String>`，由连接的写任务负责真正写入 WebSocket；
/// 入站方向由 [`ClientSession::run`] 的调用方提供。
#[derive(Debug)]
pub struct ClientSession {
    /// 会话唯一标识，注册表以此为键。
    pub session_id: Uuid,
    /// 对端地址。
    pub addr: SocketAddr,
    /// 连接建立时间。
    pub connected_at: DateTime<Utc>,
    state: SessionState,
    publisher: TelemetryPublisher,
    outbound: mpsc::Sender<String>,
    mission_activity: MissionActivity,
}

impl ClientSession {
    pub fn new(
        session_id: Uuid,
        addr: SocketAddr,
        publisher: TelemetryPublisher,
        outbound: mpsc::Sender<String>,
        mission_activity: MissionActivity,
    ) -> Self {
        Self {
            session_id,
            addr,
            connected_at: Utc::now(),
            state: SessionState::Open,
            publisher,
            outbound,
            mission_activity,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == SessionState::Closed {
            warn!("[会话 {}] 已处于 Closed，忽略到 {:?} 的状态切换。", self.session_id, next);
            return;
        }
        debug!("[会话 {}] 状态切换: {:?} -> {:?}", self.session_id, self.state, next);
        self.state = next;
    }

    /// 运行会话直到关闭，返回关闭原因。
    ///
    /// - `inbound`: 对端发来的文本帧；通道结束表示对端关闭；
    /// - `close_signal`: 注册表的关闭信号；收到信号或发送端被丢弃都视为本地关闭。
    pub async fn run(mut self, mut inbound: mpsc::Receiver<String>, mut close_signal: oneshot::Receiver<()>) -> CloseReason {
        self.transition(SessionState::Streaming);
        info!(
            "[会话 {}] 开始推送遥测 (对端: {}, 周期: {:?})",
            self.session_id,
            self.addr,
            self.publisher.period()
        );

        let mut ticker = self.publisher.cadence();
        let reason = loop {
            tokio::select! {
                biased;
                _ = &mut close_signal => break CloseReason::LocalClose,
                maybe_text = inbound.recv() => match maybe_text {
                    Some(text) => {
                        if let Err(reason) = self.handle_inbound(&text) {
                            break reason;
                        }
                    }
                    None => break CloseReason::PeerClosed,
                },
                _ = ticker.tick() => {
                    if let Err(reason) = self.publish_tick() {
                        break reason;
                    }
                }
            }
        };

        drop(ticker);
        self.transition(SessionState::Closed);
        info!(
            "[会话 {}] 已关闭 ({})，共推送 {} 帧，连接时长 {} 秒。",
            self.session_id,
            reason,
            self.publisher.frames_published(),
            (Utc::now() - self.connected_at).num_seconds()
        );
        reason
    }

    /// 处理一条上行文本。只有出站目标关闭时才返回 `Err`。
    fn handle_inbound(&mut self, text: &str) -> Result<(), CloseReason> {
        let command = match decode_command(text) {
            Ok(command) => command,
            Err(CommandDecodeError::Unknown(kind)) => {
                warn!("[会话 {}] 忽略未知指令类型 '{}'", self.session_id, kind);
                return Ok(());
            }
            Err(CommandDecodeError::Malformed(details)) => {
                warn!("[会话 {}] 忽略无法解析的上行消息: {}", self.session_id, details);
                return Ok(());
            }
        };

        let mission_active = self.mission_activity.is_active();
        match route_command(command, self.publisher.sim_mut(), mission_active) {
            CommandOutcome::Accepted => Ok(()),
            CommandOutcome::Rejected { reason } => match rejection_notice(&command, &reason) {
                Ok(notice) => self.deliver(notice),
                Err(e) => {
                    error!("[会话 {}] 编码拒绝通知失败: {}", self.session_id, e);
                    Ok(())
                }
            },
        }
    }

    fn publish_tick(&mut self) -> Result<(), CloseReason> {
        match self.publisher.publish_next(Instant::now()) {
            Ok(text) => self.deliver(text),
            Err(e) => {
                error!("[会话 {}] 编码遥测帧失败，跳过本周期: {}", self.session_id, e);
                Ok(())
            }
        }
    }

    /// 非阻塞写入出站通道。队列已满时丢弃本条，通道关闭时结束会话。
    fn deliver(&self, text: String) -> Result<(), CloseReason> {
        match self.outbound.try_send(text) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("[会话 {}] 出站队列已满，丢弃一条消息。", self.session_id);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                info!("[会话 {}] 出站目标已不可写，停止推送。", self.session_id);
                Err(CloseReason::SendTargetClosed)
            }
        }
    }
}
