use crate::core::{DecodedAudioUnit, PlaybackControl, PopResult, SyncClocks, TimeBase};
use crate::player::decode_worker::FrameQueue;
use crate::player::log_ctx;
use log::info;
use std::sync::Arc;

/// 音频拉取接口
///
/// 由音频输出端（声卡回调）按需调用，自身不驱动任何循环。
/// 音频是主时钟：每切换到一个新的音频单元就把音频时钟推进到它的 PTS。
pub struct AudioPull {
    frames: Arc<FrameQueue<DecodedAudioUnit>>,
    control: Arc<PlaybackControl>,
    clocks: Arc<SyncClocks>,
    time_base: TimeBase,
    current: Option<DecodedAudioUnit>,
    offset: usize,
}

impl AudioPull {
    pub fn new(
        frames: Arc<FrameQueue<DecodedAudioUnit>>,
        control: Arc<PlaybackControl>,
        clocks: Arc<SyncClocks>,
        time_base: TimeBase,
    ) -> Self {
        Self {
            frames,
            control,
            clocks,
            time_base,
            current: None,
            offset: 0,
        }
    }

    /// 当前单元中未读的字节数
    fn remaining(&self) -> usize {
        self.current
            .as_ref()
            .map_or(0, |unit| unit.data.len().saturating_sub(self.offset))
    }

    /// 音频解码结束 && 帧队列为空 && 当前单元已读完
    fn playback_drained(&self) -> bool {
        self.control.audio_decode_ended() && self.frames.is_empty() && self.remaining() == 0
    }

    fn mark_ended_if_drained(&self) -> bool {
        if self.playback_drained() {
            if !self.control.audio_playback_ended() {
                info!("{} 📄 音频播放完成", log_ctx());
            }
            self.control.set_audio_playback_ended();
            return true;
        }
        false
    }

    /// 切换到下一个音频单元，队列为空时返回 false
    fn advance(&mut self) -> bool {
        self.current = None;
        match self.frames.pop() {
            PopResult::Unit(unit) => {
                self.offset = 0;
                self.clocks.set_audio(self.time_base.to_micros(unit.pts));
                self.current = Some(unit);
                true
            }
            PopResult::Empty | PopResult::EndOfStream => false,
        }
    }

    /// 音频播放已结束或会话已中止，输出端可以停止拉取
    pub fn is_done(&self) -> bool {
        self.control.audio_playback_ended() || self.control.abort_requested()
    }

    /// 填充 PCM 数据
    ///
    /// 先把目标缓冲区清零（欠载时输出静音），再按顺序拷贝音频单元数据，
    /// 直到填满或没有更多数据。返回实际写入的字节数，其余部分保持静音。
    pub fn fill(&mut self, dst: &mut [u8]) -> usize {
        dst.fill(0);
        if self.mark_ended_if_drained() || self.control.audio_playback_ended() {
            return 0;
        }

        let mut written = 0;
        while written < dst.len() {
            if self.remaining() == 0 && !self.advance() {
                break;
            }
            let Some(unit) = self.current.as_ref() else {
                break;
            };
            let n = (dst.len() - written).min(unit.data.len() - self.offset);
            dst[written..written + n].copy_from_slice(&unit.data[self.offset..self.offset + n]);
            self.offset += n;
            written += n;
        }

        self.mark_ended_if_drained();
        written
    }
}
