//! 启动时的存储连通性检查。
//!
//! 服务启动前按 `StorageConfig::retry` 的固定间隔策略尝试 TCP 连接存储服务，
//! 预算耗尽仍不可达时返回 `AppError::StorageUnavailable`，由 `main` 以退出码 1 结束进程。

use common_models::RetryPolicy;
use log::{info, warn};
use std::time::Duration;
use tokio::net::TcpStream;
use url::Url;

use crate::config::StorageConfig;
use crate::error::AppError;

/// 单次连接尝试的超时时间
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// 将配置中的存储地址解析为 `host:port`。
///
/// 支持裸 `host:port` 与 `postgres://user@host:5432/db` 这样的 URL。
pub fn storage_socket_target(raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    if !raw.contains("://") {
        if raw.rsplit_once(':').map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok()) != Some(true) {
            return Err(AppError::ConfigError(format!("存储地址 '{}' 不是合法的 host:port", raw)));
        }
        return Ok(raw.to_string());
    }

    let url = Url::parse(raw).map_err(|e| AppError::ConfigError(format!("存储地址 '{}' 解析失败: {}", raw, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::ConfigError(format!("存储地址 '{}' 缺少主机名", raw)))?;
    let port = url
        .port_or_known_default()
        .or_else(|| default_port_for_scheme(url.scheme()))
        .ok_or_else(|| AppError::ConfigError(format!("存储地址 '{}' 缺少端口", raw)))?;
    Ok(format!("{}:{}", host, port))
}

fn default_port_for_scheme(scheme: &str) -> Option<u16> {
    match scheme {
        "postgres" | "postgresql" => Some(5432),
        "mysql" => Some(3306),
        "redis" => Some(6379),
        _ => None,
    }
}

/// 检查存储服务是否可达。未配置存储地址时直接跳过。
pub async fn check_storage_connectivity(config: &StorageConfig) -> Result<(), AppError> {
    let Some(raw) = config.url.as_deref() else {
        info!("[存储检查] 未配置存储地址，跳过启动连通性检查。");
        return Ok(());
    };
    let target = storage_socket_target(raw)?;
    probe_with_retry(&target, &config.retry).await
}

/// 按重试策略反复尝试 TCP 连接 `target`。
pub async fn probe_with_retry(target: &str, policy: &RetryPolicy) -> Result<(), AppError> {
    let mut failed_attempts: u32 = 0;
    loop {
        let attempt = failed_attempts + 1;
        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => {
                info!("[存储检查] 第 {} 次尝试连接 {} 成功。", attempt, target);
                return Ok(());
            }
            Ok(Err(e)) => {
                warn!("[存储检查] 第 {}/{} 次尝试连接 {} 失败: {}", attempt, policy.total_attempts(), target, e);
            }
            Err(_) => {
                warn!(
                    "[存储检查] 第 {}/{} 次尝试连接 {} 超时 ({:?})",
                    attempt,
                    policy.total_attempts(),
                    target,
                    CONNECT_TIMEOUT
                );
            }
        }

        failed_attempts = attempt;
        if !policy.should_retry(failed_attempts) {
            return Err(AppError::StorageUnavailable { target: target.to_string(), attempts: failed_attempts });
        }
        tokio::time::sleep(policy.backoff()).await;
    }
}
