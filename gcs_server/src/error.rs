use thiserror::Error;

/// 遥测服务端的主要错误类型
///
/// 单个连接上的错误（解码失败、发送目标已关闭）只在会话内部记录，不会出现在这里；
/// 这里的错误会一直传到进程边界。
#[derive(Error, Debug)]
pub enum AppError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("存储服务 {target} 在 {attempts} 次尝试后仍不可达")]
    StorageUnavailable { target: String, attempts: u32 },
}
