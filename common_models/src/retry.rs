// common_models/src/retry.rs

//! 连接重试策略。
//!
//! 遥测连接默认不重连（`RetryPolicy::disabled()`），
//! 启动时的存储连通性检查使用固定间隔重试（默认 5 次、每次间隔 2000 毫秒）。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 固定间隔的重试策略。`max_retries == 0` 表示不重试。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// 首次尝试失败之后最多再尝试的次数。
    #[serde(default, alias = "maxRetries")]
    pub max_retries: u32,
    /// 两次尝试之间的等待时间（毫秒）。
    #[serde(default, alias = "backoffMs")]
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// 不重试。
    pub const fn disabled() -> Self {
        Self { max_retries: 0, backoff_ms: 0 }
    }

    /// 固定间隔重试。
    pub const fn fixed(max_retries: u32, backoff_ms: u64) -> Self {
        Self { max_retries, backoff_ms }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// 总共允许的尝试次数（首次尝试 + 重试）。
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// 第 `failed_attempts` 次失败之后是否还能再试一次。
    pub fn should_retry(&self, failed_attempts: u32) -> bool {
        failed_attempts <= self.max_retries
    }
}
