//! 音视频同步：音频为主时钟，视频跟随
//!
//! 同步协调线程是视频的播放节拍器：每取到一帧，推进视频时钟，
//! 按同步算法计算延迟并休眠（整个流水线中唯一的真正阻塞点），
//! 然后把帧交给渲染端。

use crate::core::{DecodedVideoUnit, PlaybackControl, PlayerError, Result, SyncClocks, TimeBase, WallClock};
use crate::player::decode_worker::FrameQueue;
use crate::player::engine::FrameSink;
use crate::player::idle::IdleWait;
use crate::player::log_ctx;
use crate::player::pipeline::{send_event, PlaybackEvent};
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 同步阈值下限（秒），偏差低于阈值不做校正
pub const AV_SYNC_THRESHOLD_MIN: f64 = 0.04;
/// 同步阈值上限（秒）
pub const AV_SYNC_THRESHOLD_MAX: f64 = 0.1;
/// 帧时长不小于此值时不再加倍延迟，而是延迟 = 帧时长 + 偏差
pub const AV_SYNC_FRAMEDUP_THRESHOLD: f64 = 0.1;
/// 误差超过此值不应再做校正。
///
/// 目前没有接入延迟公式：音视频偏差极大时仍会按公式得到很长的延迟，
/// 而不是重新同步。
pub const AV_NOSYNC_THRESHOLD: f64 = 10.0;

/// 同步算法选择的分支
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// 视频落后：缩短延迟追赶（可能为 0）
    CatchUp,
    /// 视频超前且帧时长较长：延迟 = 帧时长 + 偏差
    Stretch,
    /// 视频超前且帧时长较短：延迟加倍
    Double,
    /// 偏差在容忍范围内：按帧时长播放
    Nominal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncDecision {
    pub action: SyncAction,
    /// 延迟（秒）
    pub delay: f64,
}

/// 计算当前帧的显示延迟
///
/// - `duration`: 名义帧间隔（视频时钟 - 上一帧 PTS，秒）
/// - `diff`: 视频时钟 - 音频时钟（秒），正数表示视频超前
///
/// 帧时长恰好等于 `AV_SYNC_FRAMEDUP_THRESHOLD` 时归入 Stretch 分支
/// （此时 Stretch 与 Double 得到的延迟相同）。
pub fn sync_decision(duration: f64, diff: f64) -> SyncDecision {
    let threshold = duration.clamp(AV_SYNC_THRESHOLD_MIN, AV_SYNC_THRESHOLD_MAX);

    let (action, delay) = if diff <= -threshold {
        (SyncAction::CatchUp, (duration + diff).max(0.0))
    } else if diff >= threshold && duration >= AV_SYNC_FRAMEDUP_THRESHOLD {
        (SyncAction::Stretch, duration + diff)
    } else if diff >= threshold {
        (SyncAction::Double, 2.0 * duration)
    } else {
        (SyncAction::Nominal, duration)
    };

    SyncDecision { action, delay }
}

/// 视频帧的主时钟来源
pub enum MasterClock {
    /// 音频时钟（由音频拉取接口推进）
    Audio,
    /// 没有音频流：以第一帧视频为起点的墙上时钟
    Wall(WallClock),
}

/// 视频帧输入（帧队列 + 解码器时间基）
pub struct VideoInput {
    pub frames: Arc<FrameQueue<DecodedVideoUnit>>,
    pub time_base: TimeBase,
}

/// 同步协调线程
pub struct SyncCoordinator {
    control: Arc<PlaybackControl>,
    clocks: Arc<SyncClocks>,
    video: Option<VideoInput>,
    master: MasterClock,
    sink: Box<dyn FrameSink>,
    events: Sender<PlaybackEvent>,
    /// 当前显示的帧（上一帧在新帧交给渲染端后释放）
    current: Option<DecodedVideoUnit>,
    presented: u64,
}

impl SyncCoordinator {
    pub fn new(
        control: Arc<PlaybackControl>,
        clocks: Arc<SyncClocks>,
        video: Option<VideoInput>,
        master: MasterClock,
        sink: Box<dyn FrameSink>,
        events: Sender<PlaybackEvent>,
    ) -> Self {
        Self {
            control,
            clocks,
            video,
            master,
            sink,
            events,
            current: None,
            presented: 0,
        }
    }

    /// 事件循环：整体播放完成时发送 `Finished` 并退出
    pub fn run(mut self, idle: &IdleWait) {
        info!("{} 🎬 同步协调线程启动", log_ctx());

        loop {
            if self.control.update_playback_ended() {
                let read_failed = self.control.read_failed();
                info!(
                    "{} ✅ 播放完成（显示 {} 帧{}）",
                    log_ctx(),
                    self.presented,
                    if read_failed { "，读包出错提前结束" } else { "" }
                );
                self.notify(PlaybackEvent::Finished { read_failed });
                break;
            }
            if self.control.abort_requested() {
                info!("{} ⏹ 同步协调线程收到中止", log_ctx());
                self.notify(PlaybackEvent::Stopped);
                break;
            }

            if self.refresh_video() {
                idle.reset();
            } else {
                idle.wait();
            }
        }

        self.current = None;
        info!("{} 🛑 同步协调线程结束", log_ctx());
    }

    fn notify(&self, event: PlaybackEvent) {
        send_event(&self.events, event);
    }

    /// 尝试显示下一帧，返回是否有进展
    fn refresh_video(&mut self) -> bool {
        if self.control.video_playback_ended() {
            return false;
        }
        let Some(video) = self.video.as_ref() else {
            return false;
        };

        if self.control.video_decode_ended() && video.frames.is_empty() {
            if let Some(last) = self.current.take() {
                debug!("{} 释放最后一帧 pts={}", log_ctx(), last.pts);
            }
            self.control.set_video_playback_ended();
            info!("{} 📄 视频播放完成", log_ctx());
            return true;
        }

        match video.frames.pop() {
            crate::core::PopResult::Unit(unit) => {
                let pts_us = video.time_base.to_micros(unit.pts);
                self.present(unit, pts_us);
                true
            }
            _ => false,
        }
    }

    fn master_clock_us(&self, pts_us: i64) -> i64 {
        match &self.master {
            MasterClock::Audio => self.clocks.audio(),
            MasterClock::Wall(clock) => {
                clock.start_at(pts_us);
                clock.now_us()
            }
        }
    }

    fn present(&mut self, unit: DecodedVideoUnit, pts_us: i64) {
        let last_pts = self.clocks.advance_video(pts_us);
        // 第一帧没有帧间隔
        let last_pts = if self.presented == 0 { pts_us } else { last_pts };

        let master_us = self.master_clock_us(pts_us);
        let duration = (pts_us - last_pts) as f64 / 1_000_000.0;
        let diff = (pts_us - master_us) as f64 / 1_000_000.0;
        let decision = sync_decision(duration, diff);

        if diff.abs() >= AV_NOSYNC_THRESHOLD {
            warn!(
                "{} ⚠️ 音视频偏差 {:.3}s 超过 {}s，仍按同步公式处理",
                log_ctx(),
                diff,
                AV_NOSYNC_THRESHOLD
            );
        }
        if self.presented < 5 || self.presented % 100 == 0 {
            debug!(
                "{} 🎬 帧 #{} pts={}us duration={:.3}s diff={:.3}s → {:?} {:.3}s",
                log_ctx(),
                self.presented,
                pts_us,
                duration,
                diff,
                decision.action,
                decision.delay
            );
        }

        if decision.delay.is_finite() && decision.delay > 0.0 {
            thread::sleep(Duration::from_secs_f64(decision.delay));
        }

        self.sink.present(&unit);
        self.presented += 1;
        // 新帧交给渲染端后释放上一帧
        self.current = Some(unit);
    }
}

/// 启动同步协调线程
pub fn spawn(coordinator: SyncCoordinator, idle_backoff: bool) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("av-sync".to_string())
        .spawn(move || {
            let idle = IdleWait::new(idle_backoff);
            coordinator.run(&idle);
        })
        .map_err(|e| PlayerError::ThreadError(format!("启动同步协调线程失败: {}", e)))
}
