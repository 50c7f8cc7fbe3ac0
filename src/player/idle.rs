use crossbeam::utils::Backoff;
use std::thread;
use std::time::Duration;

/// 轮询等待策略
///
/// 各工作线程在队列为空或缓存过载时轮询等待。启用退避时先自旋、再 yield，
/// 退避耗尽后每次休眠 1ms；关闭退避时纯自旋。
pub struct IdleWait {
    backoff: Option<Backoff>,
}

impl IdleWait {
    pub fn new(enabled: bool) -> Self {
        Self {
            backoff: enabled.then(Backoff::new),
        }
    }

    /// 本轮无事可做
    pub fn wait(&self) {
        match &self.backoff {
            Some(backoff) if backoff.is_completed() => thread::sleep(Duration::from_millis(1)),
            Some(backoff) => backoff.snooze(),
            None => std::hint::spin_loop(),
        }
    }

    /// 本轮有进展，重置退避
    pub fn reset(&self) {
        if let Some(backoff) = &self.backoff {
            backoff.reset();
        }
    }
}
