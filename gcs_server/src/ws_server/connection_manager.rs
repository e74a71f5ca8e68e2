// gcs_server/src/ws_server/connection_manager.rs

//! 遥测会话注册表。
//!
//! 进程内唯一共享的资源：会话 ID → 会话句柄的映射。连接被接受时插入，会话结束时移除。
//! 句柄中保存会话的关闭信号发送端，进程退出前通过 `close_all` 逐个关闭。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::client_session::ClientSession;
use super::mission_activity::MissionActivity;
use super::telemetry_publisher::TelemetryPublisher;
use crate::config::TelemetryConfig;
use crate::vehicle_sim::SimulationParams;

/// 注册表中保存的会话句柄
#[derive(Debug)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
    close_tx: oneshot::Sender<()>,
}

impl SessionHandle {
    /// 向会话发出关闭信号。会话已经结束时什么也不做。
    pub fn close(self) {
        if self.close_tx.send(()).is_err() {
            debug!("[连接管理器] 会话 {} 已结束，关闭信号未送达。", self.session_id);
        }
    }
}

/// 管理所有活动的遥测会话
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    /// Key: session_id；Value: 会话句柄
    sessions: Arc<DashMap<Uuid, SessionHandle>>,
    mission_activity: MissionActivity,
    sim_params: SimulationParams,
    publish_interval: Duration,
}

impl ConnectionManager {
    pub fn new(telemetry: &TelemetryConfig, mission_activity: MissionActivity) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            mission_activity,
            sim_params: SimulationParams::from(telemetry),
            publish_interval: telemetry.publish_interval(),
        }
    }

    pub fn mission_activity(&self) -> &MissionActivity {
        &self.mission_activity
    }

    /// 更新任务活动标志，对所有会话（包括已经建立的）立即生效。
    pub fn set_mission_active(&self, active: bool) {
        let previous = self.mission_activity.is_active();
        self.mission_activity.set_active(active);
        if previous != active {
            info!("[连接管理器] 任务活动标志: {} -> {}", previous, active);
        }
    }

    /// 为新接受的连接创建会话并登记句柄。
    ///
    /// 每个会话都拿到一份全新的模拟状态；返回的关闭信号接收端需要交给 [`ClientSession::run`]。
    pub fn open_session(
        &self,
        addr: SocketAddr,
        outbound: mpsc::Sender<String>,
    ) -> (ClientSession, oneshot::Receiver<()>) {
        let session_id = Uuid::new_v4();
        let (close_tx, close_rx) = oneshot::channel();
        let publisher = TelemetryPublisher::new(self.sim_params, self.publish_interval);
        let session = ClientSession::new(session_id, addr, publisher, outbound, self.mission_activity.clone());

        self.sessions.insert(
            session_id,
            SessionHandle { session_id, addr, connected_at: session.connected_at, close_tx },
        );
        info!("[连接管理器] 新遥测会话: id={}, addr={}", session_id, addr);
        debug!("[连接管理器] 当前活动会话总数: {}", self.sessions.len());

        (session, close_rx)
    }

    /// 会话结束后移除其句柄。
    pub fn remove_session(&self, session_id: &Uuid) -> Option<SessionHandle> {
        match self.sessions.remove(session_id) {
            Some((_id, handle)) => {
                info!(
                    "[连接管理器] 会话已移除: id={}, addr={}, 连接于 {}",
                    handle.session_id,
                    handle.addr,
                    handle.connected_at.to_rfc3339()
                );
                debug!("[连接管理器] 移除后当前活动会话总数: {}", self.sessions.len());
                Some(handle)
            }
            None => {
                debug!("[连接管理器] 会话 {} 不在注册表中（可能已被主动关闭）。", session_id);
                None
            }
        }
    }

    /// 主动关闭一个会话。会话存在时返回 `true`。
    pub fn close_session(&self, session_id: &Uuid) -> bool {
        match self.remove_session(session_id) {
            Some(handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    /// 关闭全部会话，返回发出关闭信号的数量。
    pub fn close_all(&self) -> usize {
        let ids: Vec<Uuid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let closed = ids.iter().filter(|id| self.close_session(id)).count();
        info!("[连接管理器] 已向 {} 个会话发出关闭信号。", closed);
        closed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains(&self, session_id: &Uuid) -> bool {
        self.sessions.contains_key(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_server::client_session::CloseReason;

    fn manager() -> ConnectionManager {
        let telemetry = TelemetryConfig { publish_interval_ms: 1000, ..TelemetryConfig::default() };
        ConnectionManager::new(&telemetry, MissionActivity::new())
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:40001".parse().unwrap()
    }

    #[tokio::test]
    async fn test_open_and_remove() {
        let manager = manager();
        let (tx, _rx) = mpsc::channel(4);
        let (session, _close_rx) = manager.open_session(addr(), tx);

        assert!(manager.contains(&session.session_id));
        assert_eq!(manager.session_count(), 1);
        assert!(manager.remove_session(&session.session_id).is_some());
        assert!(manager.remove_session(&session.session_id).is_none());
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_sessions_get_distinct_ids() {
        let manager = manager();
        let (tx, _rx) = mpsc::channel(4);
        let (first, _c1) = manager.open_session(addr(), tx.clone());
        let (second, _c2) = manager.open_session(addr(), tx);
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(manager.session_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    /// close_all 让正在运行的会话以本地关闭结束，并清空注册表。
    async fn test_close_all_stops_running_sessions() {
        let manager = manager();
        let mut tasks = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (outbound_tx, outbound_rx) = mpsc::channel(8);
            let (inbound_tx, inbound_rx) = mpsc::channel(8);
            let (session, close_rx) = manager.open_session(addr(), outbound_tx);
            tasks.push(tokio::spawn(session.run(inbound_rx, close_rx)));
            receivers.push((inbound_tx, outbound_rx));
        }

        assert_eq!(manager.close_all(), 3);
        assert_eq!(manager.session_count(), 0);
        for task in tasks {
            assert_eq!(task.await.unwrap(), CloseReason::LocalClose);
        }
    }

    #[tokio::test]
    async fn test_mission_activity_is_shared_with_sessions() {
        let manager = manager();
        let observer = manager.mission_activity().clone();
        manager.set_mission_active(true);
        assert!(observer.is_active());
        manager.set_mission_active(false);
        assert!(!observer.is_active());
    }
}
