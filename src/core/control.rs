use std::sync::atomic::{AtomicBool, Ordering};

/// 播放控制状态 - 各工作线程共享的完成/中止标记
///
/// 每个标记只有一个写线程：
/// - `read_ended`: 读包线程
/// - `audio_decode_ended` / `video_decode_ended`: 对应解码线程
/// - `audio_playback_ended`: 音频拉取接口
/// - `video_playback_ended` / `playback_ended`: 同步协调线程
/// - `abort`: 控制方（停止播放）
///
/// 标记一旦置位不会被清除，除非显式调用 `reset_for_seek`。
#[derive(Debug, Default)]
pub struct PlaybackControl {
    read_ended: AtomicBool,
    read_failed: AtomicBool,
    audio_decode_ended: AtomicBool,
    video_decode_ended: AtomicBool,
    audio_playback_ended: AtomicBool,
    video_playback_ended: AtomicBool,
    playback_ended: AtomicBool,
    abort: AtomicBool,
    has_audio: AtomicBool,
    has_video: AtomicBool,
}

impl PlaybackControl {
    /// 根据实际存在的流创建；缺失的流其播放完成标记预先置为 true
    pub fn new(has_audio: bool, has_video: bool) -> Self {
        let control = Self::default();
        control.has_audio.store(has_audio, Ordering::SeqCst);
        control.has_video.store(has_video, Ordering::SeqCst);
        control.preset_absent_streams();
        control
    }

    fn preset_absent_streams(&self) {
        if !self.has_audio() {
            self.audio_playback_ended.store(true, Ordering::SeqCst);
        }
        if !self.has_video() {
            self.video_playback_ended.store(true, Ordering::SeqCst);
        }
    }

    pub fn has_audio(&self) -> bool {
        self.has_audio.load(Ordering::SeqCst)
    }

    pub fn has_video(&self) -> bool {
        self.has_video.load(Ordering::SeqCst)
    }

    pub fn read_ended(&self) -> bool {
        self.read_ended.load(Ordering::SeqCst)
    }

    pub fn set_read_ended(&self) {
        self.read_ended.store(true, Ordering::SeqCst);
    }

    /// 读包是否因错误而结束（对外的"播放完成"不区分这一点）
    pub fn read_failed(&self) -> bool {
        self.read_failed.load(Ordering::SeqCst)
    }

    pub fn set_read_failed(&self) {
        self.read_failed.store(true, Ordering::SeqCst);
    }

    pub fn audio_decode_ended(&self) -> bool {
        self.audio_decode_ended.load(Ordering::SeqCst)
    }

    pub fn video_decode_ended(&self) -> bool {
        self.video_decode_ended.load(Ordering::SeqCst)
    }

    pub fn set_decode_ended(&self, audio: bool) {
        if audio {
            self.audio_decode_ended.store(true, Ordering::SeqCst);
        } else {
            self.video_decode_ended.store(true, Ordering::SeqCst);
        }
    }

    pub fn audio_playback_ended(&self) -> bool {
        self.audio_playback_ended.load(Ordering::SeqCst)
    }

    pub fn set_audio_playback_ended(&self) {
        self.audio_playback_ended.store(true, Ordering::SeqCst);
    }

    pub fn video_playback_ended(&self) -> bool {
        self.video_playback_ended.load(Ordering::SeqCst)
    }

    pub fn set_video_playback_ended(&self) {
        self.video_playback_ended.store(true, Ordering::SeqCst);
    }

    /// 重新计算整体播放完成：音频完成 && 视频完成
    pub fn update_playback_ended(&self) -> bool {
        let ended = self.audio_playback_ended() && self.video_playback_ended();
        if ended {
            self.playback_ended.store(true, Ordering::SeqCst);
        }
        ended
    }

    pub fn playback_ended(&self) -> bool {
        self.playback_ended.load(Ordering::SeqCst)
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Seek 时复位所有完成标记（不包括中止标记）
    pub fn reset_for_seek(&self) {
        for flag in [
            &self.read_ended,
            &self.read_failed,
            &self.audio_decode_ended,
            &self.video_decode_ended,
            &self.audio_playback_ended,
            &self.video_playback_ended,
            &self.playback_ended,
        ] {
            flag.store(false, Ordering::SeqCst);
        }
        self.preset_absent_streams();
    }
}
