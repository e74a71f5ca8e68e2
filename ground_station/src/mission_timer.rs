// ground_station/src/mission_timer.rs

//! 客户端任务计时器。
//!
//! 服务端没有权威的任务时钟，任务时长完全由客户端计时。
//! 经过的秒数由启动时刻推算；另有一个每秒推送一次的展示节拍，供界面刷新 `MM:SS`。

use common_models::telemetry::format_flight_time;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const DISPLAY_TICK: Duration = Duration::from_secs(1);

/// 任务计时器。再次 `start` 会从 0 重新开始，不会叠加。
#[derive(Debug)]
pub struct MissionTimer {
    started_at: Option<Instant>,
    display_tx: Arc<watch::Sender<u64>>,
    ticker: Option<JoinHandle<()>>,
}

impl Default for MissionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionTimer {
    pub fn new() -> Self {
        let (display_tx, _) = watch::channel(0);
        Self { started_at: None, display_tx: Arc::new(display_tx), ticker: None }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// 当前经过的整秒数，未运行时为 0。
    pub fn elapsed_seconds(&self) -> u64 {
        self.started_at.map(|start| start.elapsed().as_secs()).unwrap_or(0)
    }

    /// `MM:SS` 格式的当前计时。
    pub fn formatted(&self) -> String {
        format_flight_time(self.elapsed_seconds())
    }

    /// 订阅每秒一次的展示更新。
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.display_tx.subscribe()
    }

    /// 从 0 开始计时。正在运行时先停止旧的计时。需要在 tokio 运行时中调用。
    pub fn start(&mut self) {
        if let Some(old) = self.ticker.take() {
            old.abort();
            debug!("[任务计时器] 重新开始，旧的展示节拍已取消。");
        }
        let started_at = Instant::now();
        self.started_at = Some(started_at);
        self.display_tx.send_replace(0);

        let display_tx = Arc::clone(&self.display_tx);
        self.ticker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(started_at + DISPLAY_TICK, DISPLAY_TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                display_tx.send_replace(started_at.elapsed().as_secs());
            }
        }));
        info!("[任务计时器] 已开始计时。");
    }

    /// 停止计时并返回最终的整秒数。未运行时返回 0。
    pub fn stop(&mut self) -> u64 {
        let elapsed = self.elapsed_seconds();
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if self.started_at.take().is_some() {
            self.display_tx.send_replace(elapsed);
            info!("[任务计时器] 已停止，任务时长 {} ({} 秒)。", format_flight_time(elapsed), elapsed);
        }
        elapsed
    }
}

impl Drop for MissionTimer {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_start_advance_stop_returns_elapsed() {
        let mut timer = MissionTimer::new();
        timer.start();
        tokio::time::advance(Duration::from_secs(75)).await;
        assert_eq!(timer.formatted(), "01:15");
        assert_eq!(timer.stop(), 75);
        assert!(!timer.is_running());
        assert_eq!(timer.elapsed_seconds(), 0);
    }

    #[tokio::test(start_paused = true)]
    /// 运行中再次 start 从 0 重新计时，不叠加。
    async fn test_restart_resets_to_zero() {
        let mut timer = MissionTimer::new();
        timer.start();
        tokio::time::advance(Duration::from_secs(10)).await;
        timer.start();
        assert_eq!(timer.elapsed_seconds(), 0);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(timer.stop(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_updates_each_second() {
        let mut timer = MissionTimer::new();
        let display = timer.subscribe();
        timer.start();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(*display.borrow(), 3);

        timer.stop();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(*display.borrow(), 3, "停止后不应继续更新");
    }

    #[test]
    fn test_stop_without_start() {
        let mut timer = MissionTimer::new();
        assert_eq!(timer.stop(), 0);
        assert_eq!(timer.formatted(), "00:00");
    }
}
