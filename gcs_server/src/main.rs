use gcs_server::config;
use gcs_server::storage_probe::check_storage_connectivity;
use gcs_server::ws_server::connection_manager::ConnectionManager;
use gcs_server::ws_server::mission_activity::MissionActivity;
use gcs_server::ws_server::service::WsService;
use log::{error, info, LevelFilter};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

/// 初始化日志记录器。
///
/// 设置了 `RUST_LOG` 时以它为准；否则先按 Info 输出，读取配置后再按 `log_level` 调整。
fn init_logger() -> bool {
    let rust_log_set = env::var("RUST_LOG").is_ok();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .parse_env("RUST_LOG")
        .format_timestamp_millis()
        .init();
    if !rust_log_set {
        log::set_max_level(LevelFilter::Info);
    }
    rust_log_set
}

#[tokio::main]
async fn main() -> ExitCode {
    let rust_log_set = init_logger();
    info!("[主程序] 日志系统已成功初始化 (env_logger)。");

    let app_config = config::load_or_create_config();
    if !rust_log_set {
        log::set_max_level(app_config.log_level_filter());
    }
    if let Err(e) = app_config.validate() {
        error!("[主程序] 配置无效: {}", e);
        return ExitCode::FAILURE;
    }
    info!(
        "[主程序] 应用配置已加载。监听地址: {}，遥测路径: {}，发布周期: {:?}",
        app_config.listen_addr(),
        app_config.server.telemetry_path,
        app_config.telemetry.publish_interval()
    );

    if let Err(e) = check_storage_connectivity(&app_config.storage).await {
        error!("[主程序] 致命错误：存储服务不可用，进程退出: {}", e);
        return ExitCode::from(1);
    }

    let connection_manager = Arc::new(ConnectionManager::new(&app_config.telemetry, MissionActivity::new()));
    info!("[主程序] 遥测会话注册表 (ConnectionManager) 已创建，任务活动标志初始为不活动。");

    let ws_service = WsService::new(app_config, Arc::clone(&connection_manager));
    if let Err(e) = ws_service.start().await {
        error!("[主程序] 致命错误：遥测服务运行时发生严重问题: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("[主程序] 遥测服务已正常退出，剩余会话数: {}", connection_manager.session_count());
    ExitCode::SUCCESS
}
