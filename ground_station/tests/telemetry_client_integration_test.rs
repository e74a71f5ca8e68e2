// ground_station/tests/telemetry_client_integration_test.rs

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common_models::storage::{InMemoryStore, MissionStore};
use common_models::ws_payloads::DISARM_DURING_MISSION_REASON;
use common_models::{Command, RetryPolicy, TelemetryFrame};
use gcs_server::config::AppConfig;
use gcs_server::ws_server::connection_manager::ConnectionManager;
use gcs_server::ws_server::mission_activity::MissionActivity;
use gcs_server::ws_server::service::WsService;
use ground_station::event::{ClientEvent, ConnectionState, ConnectionStatusEvent};
use ground_station::{ClientConfig, MissionController, TelemetryClientService};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};

const WAIT: Duration = Duration::from_secs(5);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct RunningServer {
    addr: SocketAddr,
    connection_manager: Arc<ConnectionManager>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn start_server() -> RunningServer {
    let mut config = AppConfig::default();
    config.telemetry.publish_interval_ms = 50;
    let connection_manager = Arc::new(ConnectionManager::new(&config.telemetry, MissionActivity::new()));
    let service = WsService::new(config, Arc::clone(&connection_manager));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = service
            .serve_on(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    RunningServer { addr, connection_manager, shutdown: Some(shutdown_tx) }
}

fn page_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::for_page(format!("http://{}/dashboard?tab=live", addr))
}

async fn connect_client(addr: SocketAddr) -> TelemetryClientService {
    let client = TelemetryClientService::open(&page_config(addr)).await.unwrap();
    assert_eq!(client.endpoint().as_str(), format!("ws://{}/ws/live", addr));

    let mut state = client.watch_state();
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Open))
        .await
        .expect("等待连接打开超时")
        .unwrap();
    client
}

/// 轮询缓存，直到最新帧满足条件。
async fn wait_for_frame(client: &TelemetryClientService, predicate: impl Fn(&TelemetryFrame) -> bool) {
    tokio::time::timeout(WAIT, async {
        loop {
            if let Some(frame) = client.latest_frame().await {
                if predicate(&frame) {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("等待遥测帧超时");
}

/// 等待下一个连接状态事件，跳过其他事件。
async fn next_status(events: &mut broadcast::Receiver<ClientEvent>) -> ConnectionStatusEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(ClientEvent::ConnectionStatus(status)) => return status,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("事件通道意外关闭"),
            }
        }
    })
    .await
    .expect("等待连接状态事件超时")
}

async fn wait_for_session_count(server: &RunningServer, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while server.connection_manager.session_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("等待服务端会话数变化超时");
}

#[tokio::test]
async fn test_client_receives_frames_and_arms_vehicle() {
    init_logger();
    let server = start_server().await;
    let client = connect_client(server.addr).await;

    wait_for_frame(&client, |frame| !frame.armed).await;
    assert!(client.set_armed(true, false).await.unwrap());
    wait_for_frame(&client, |frame| frame.armed).await;

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(!client.send_command(Command::SetArm(false)).await.unwrap());
}

#[tokio::test]
async fn test_server_rejects_disarm_during_mission() {
    init_logger();
    let server = start_server().await;
    let client = connect_client(server.addr).await;
    let mut events = client.subscribe_events();

    assert!(client.set_armed(true, false).await.unwrap());
    wait_for_frame(&client, |frame| frame.armed).await;

    server.connection_manager.set_mission_active(true);
    // 客户端未感知任务状态，指令送达服务端后被拒绝
    assert!(client.set_armed(false, false).await.unwrap());
    let rejection = tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(ClientEvent::CommandRejected(payload)) => return payload,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("事件通道意外关闭"),
            }
        }
    })
    .await
    .expect("等待拒绝通知超时");
    assert_eq!(rejection.reason, DISARM_DURING_MISSION_REASON);
    assert!(client.latest_frame().await.unwrap().armed);
}

#[tokio::test]
async fn test_mission_saves_last_frame_track() {
    init_logger();
    let server = start_server().await;
    let client = connect_client(server.addr).await;
    let mut controller = MissionController::new(InMemoryStore::new());

    controller.launch(None);
    assert!(client.set_armed(false, controller.is_active()).await.is_err());
    wait_for_frame(&client, |frame| !frame.gps_track.is_empty()).await;

    let last_frame = client.display_frame().await;
    let saved = controller.end(&last_frame).await.unwrap();
    assert_eq!(saved.name, "Mission 1");
    assert_eq!(saved.gps_track, last_frame.gps_track);
    assert_eq!(controller.store().list_missions().await.unwrap().len(), 1);

    client.disconnect().await;
}

#[tokio::test]
/// 服务端断开一次，`fixed(1, 10)` 策略下客户端重连一次，新连接上遥测和指令照常工作。
async fn test_single_drop_reconnects_once() {
    init_logger();
    let server = start_server().await;
    let client = TelemetryClientService::new(&page_config(server.addr).with_reconnect(RetryPolicy::fixed(1, 10))).unwrap();
    let mut events = client.subscribe_events();
    client.connect().await;

    assert!(next_status(&mut events).await.connected);
    wait_for_frame(&client, |frame| !frame.armed).await;
    wait_for_session_count(&server, 1).await;

    assert_eq!(server.connection_manager.close_all(), 1);
    assert!(next_status(&mut events).await.connected, "断开后应自动重连");
    assert_eq!(client.state(), ConnectionState::Open);

    assert!(client.set_armed(true, false).await.unwrap());
    wait_for_frame(&client, |frame| frame.armed).await;
    wait_for_session_count(&server, 1).await;
}

#[tokio::test]
/// 重连预算按一次 connect 调用累计，握手成功不清零：第二次断开后进入 Closed。
async fn test_repeated_drops_exhaust_reconnect_budget() {
    init_logger();
    let server = start_server().await;
    let client = TelemetryClientService::new(&page_config(server.addr).with_reconnect(RetryPolicy::fixed(1, 10))).unwrap();
    let mut events = client.subscribe_events();
    let mut state = client.watch_state();
    client.connect().await;

    assert!(next_status(&mut events).await.connected);
    wait_for_session_count(&server, 1).await;
    server.connection_manager.close_all();

    assert!(next_status(&mut events).await.connected);
    wait_for_session_count(&server, 1).await;
    server.connection_manager.close_all();

    let last = next_status(&mut events).await;
    assert!(!last.connected);
    assert!(last.error_message.is_some());
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Closed))
        .await
        .expect("等待 Closed 超时")
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(server.connection_manager.session_count(), 0);
}

#[tokio::test]
/// 服务端握手后立即断开：总连接次数不超过 `max_retries + 1`，最终停在 Closed。
async fn test_accept_then_close_server_is_bounded() {
    init_logger();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    let server = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(ws_stream);
            }
        }
    });

    let client = TelemetryClientService::new(&page_config(addr).with_reconnect(RetryPolicy::fixed(2, 10))).unwrap();
    let mut state = client.watch_state();
    client.connect().await;
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Closed))
        .await
        .expect("重连次数应有上限")
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
    assert_eq!(client.state(), ConnectionState::Closed);
    server.abort();
}

#[tokio::test]
/// 丢弃连接管理器即释放连接，服务端随之移除会话。
async fn test_dropping_client_releases_connection() {
    init_logger();
    let server = start_server().await;
    let client = connect_client(server.addr).await;
    wait_for_frame(&client, |_| true).await;
    wait_for_session_count(&server, 1).await;

    drop(client);
    wait_for_session_count(&server, 0).await;
}
