// gcs_server/src/ws_server/mission_activity.rs

//! 服务端的任务活动上下文。
//!
//! 服务端没有权威的任务时钟，只有一个由注册表持有、所有会话的指令路由共同读取的标志。
//!
//! 服务端自身没有任何入口会修改它：`gcs_server` 二进制启动时该标志为不活动，且一直保持不活动，
//! 这时任务中上锁的拒绝只由地面站客户端 `set_armed` 的本地检查生效。
//! 把服务端嵌入到其他进程中的调用方通过 `ConnectionManager::set_mission_active` 驱动该标志。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 共享的“任务进行中”标志，默认不活动。
#[derive(Debug, Clone, Default)]
pub struct MissionActivity {
    active: Arc<AtomicBool>,
}

impl MissionActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}
