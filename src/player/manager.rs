use crate::core::{BufferStatus, MediaInfo, MediaKind, PlayerConfig, PlayerError, Result};
use crate::player::audio_output::{AudioOutput, PacedPull};
use crate::player::decode_worker::{audio_cache_budget, video_cache_budget, StreamDecoder};
use crate::player::decoder::{AudioCodec, AudioResampler, VideoCodec, VideoScaler};
use crate::player::demuxer::{rational_fps, Demuxer};
use crate::player::log_ctx;
use crate::player::pipeline::{Pipeline, PipelineBuilder, PlaybackEvent};
use crate::player::sink::{FrameHandle, LatestFrameSink};
use crossbeam_channel::Receiver;
use ffmpeg_next as ffmpeg;
use log::{info, warn};

/// 音频消费端：声卡输出，或没有可用声卡时的实时拉取线程
enum AudioSink {
    Device(AudioOutput),
    Paced(PacedPull),
}

/// 播放器 - 打开一个媒体文件并驱动整条播放流水线
pub struct Player {
    media_info: MediaInfo,
    frames: FrameHandle,
    audio: Option<AudioSink>,
    pipeline: Pipeline<ffmpeg::Packet>,
}

impl Player {
    /// 打开媒体文件并开始播放
    ///
    /// 单路流的解码器打开失败时只跳过该路；两路都不可用时返回 `NoPlayableStream`。
    pub fn open(path: &str, config: &PlayerConfig) -> Result<Self> {
        info!("{} 📂 打开媒体: {}", log_ctx(), path);

        let demuxer = Demuxer::open(path)?;
        let media_info = demuxer.media_info().clone();

        let audio = match demuxer.audio_stream() {
            Some(stream) => match AudioCodec::from_stream(&stream) {
                Ok((codec, format)) => {
                    let budget = audio_cache_budget(&format, config.preload_seconds);
                    info!(
                        "{} 🔊 音频流 #{}: {} Hz, {} 声道，缓存上限 {} 字节",
                        log_ctx(),
                        stream.index(),
                        format.sample_rate,
                        format.channels,
                        budget
                    );
                    let decoder = StreamDecoder::new(
                        MediaKind::Audio,
                        codec,
                        AudioResampler::new(format),
                        stream.time_base().into(),
                        budget,
                    );
                    Some((stream.index(), format, decoder))
                }
                Err(e) => {
                    warn!("{} ⚠ 音频解码器打开失败，忽略音频: {}", log_ctx(), e);
                    None
                }
            },
            None => None,
        };

        let video = match demuxer.video_stream() {
            Some(stream) => match VideoCodec::from_stream(&stream) {
                Ok((codec, format, codec_fps)) => {
                    let budget = video_cache_budget(
                        &format,
                        rational_fps(stream.avg_frame_rate()),
                        codec_fps,
                        config.preload_seconds,
                    );
                    info!(
                        "{} 🎞 视频流 #{}: {}x{}，缓存上限 {} 字节",
                        log_ctx(),
                        stream.index(),
                        format.width,
                        format.height,
                        budget
                    );
                    let decoder = StreamDecoder::new(
                        MediaKind::Video,
                        codec,
                        VideoScaler::new(format),
                        stream.time_base().into(),
                        budget,
                    );
                    Some((stream.index(), format, decoder))
                }
                Err(e) => {
                    warn!("{} ⚠ 视频解码器打开失败，忽略视频: {}", log_ctx(), e);
                    None
                }
            },
            None => None,
        };

        let mut builder = PipelineBuilder::new(demuxer, config.clone());
        let mut audio_format = None;
        if let Some((index, format, decoder)) = audio {
            builder = builder.audio(index, decoder);
            audio_format = Some(format);
        }
        if let Some((index, format, decoder)) = video {
            builder = builder.video(index, format, decoder);
        }

        let (sink, frames) = LatestFrameSink::new();
        let mut pipeline = builder.start(Box::new(sink))?;

        let audio = match (pipeline.take_audio_pull(), audio_format) {
            (Some(pull), Some(format)) => Some(Self::open_audio_sink(pull, format, config)?),
            _ => None,
        };

        Ok(Self {
            media_info,
            frames,
            audio,
            pipeline,
        })
    }

    fn open_audio_sink(
        pull: crate::player::audio_pull::AudioPull,
        format: crate::core::AudioFormat,
        config: &PlayerConfig,
    ) -> Result<AudioSink> {
        if config.audio_output {
            match AudioOutput::open(format) {
                Ok(mut output) => {
                    output.start(pull)?;
                    return Ok(AudioSink::Device(output));
                }
                Err(e) => warn!("{} ⚠ 声卡不可用，改为实时拉取音频: {}", log_ctx(), e),
            }
        }
        Ok(AudioSink::Paced(PacedPull::spawn(pull, format)?))
    }

    pub fn events(&self) -> &Receiver<PlaybackEvent> {
        self.pipeline.events()
    }

    pub fn media_info(&self) -> &MediaInfo {
        &self.media_info
    }

    /// 渲染端句柄（帧就绪通知 + 最新一帧）
    pub fn frame_handle(&self) -> FrameHandle {
        self.frames.clone()
    }

    pub fn buffer_status(&self) -> BufferStatus {
        self.pipeline.buffer_status()
    }

    pub fn is_finished(&self) -> bool {
        self.pipeline.is_finished()
    }

    /// 设置音量（仅声卡输出时有效）
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        match &self.audio {
            Some(AudioSink::Device(output)) => {
                output.set_volume(volume);
                Ok(())
            }
            _ => Err(PlayerError::AudioError("没有可用的声卡输出".to_string())),
        }
    }

    /// 停止播放：先停音频输出，再停流水线
    pub fn stop(&mut self) {
        match self.audio.take() {
            Some(AudioSink::Device(mut output)) => output.stop(),
            Some(AudioSink::Paced(mut paced)) => paced.stop(),
            None => {}
        }
        self.pipeline.stop();
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}
