use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// 音视频时钟（单位：微秒）
///
/// 音频时钟由音频拉取接口在切换到新音频单元时推进，
/// 视频时钟由同步协调线程在取到新视频帧时推进。
#[derive(Debug, Default)]
pub struct SyncClocks {
    audio_us: AtomicI64,
    video_us: AtomicI64,
}

impl SyncClocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn audio(&self) -> i64 {
        self.audio_us.load(Ordering::Acquire)
    }

    pub fn set_audio(&self, pts_us: i64) {
        self.audio_us.store(pts_us, Ordering::Release);
    }

    pub fn video(&self) -> i64 {
        self.video_us.load(Ordering::Acquire)
    }

    /// 设置视频时钟，返回旧值（即上一帧的 PTS）
    pub fn advance_video(&self, pts_us: i64) -> i64 {
        self.video_us.swap(pts_us, Ordering::AcqRel)
    }
}

/// 墙上时钟 - 没有音频流时作为视频的主时钟
#[derive(Clone)]
pub struct WallClock {
    inner: Arc<Mutex<WallClockInner>>,
}

struct WallClockInner {
    base_us: i64,                 // 基准 PTS（微秒）
    base_instant: Option<Instant>, // None 表示尚未开始
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(WallClockInner {
                base_us: 0,
                base_instant: None,
            })),
        }
    }

    /// 以指定 PTS 为起点开始计时（已开始则忽略）
    pub fn start_at(&self, pts_us: i64) {
        let mut inner = self.inner.lock();
        if inner.base_instant.is_none() {
            inner.base_us = pts_us;
            inner.base_instant = Some(Instant::now());
        }
    }

    /// 当前时间（微秒）
    pub fn now_us(&self) -> i64 {
        let inner = self.inner.lock();
        match inner.base_instant {
            Some(instant) => inner.base_us + instant.elapsed().as_micros() as i64,
            None => inner.base_us,
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}
