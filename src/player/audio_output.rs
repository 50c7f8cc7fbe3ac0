use crate::core::{AudioFormat, PlayerError, Result};
use crate::player::audio_pull::AudioPull;
use crate::player::log_ctx;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat as DeviceSampleFormat, Stream, StreamConfig, SupportedStreamConfigRange};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 音频输出 - 使用 cpal 播放音频，由声卡回调驱动 `AudioPull`
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: DeviceSampleFormat,
    stream: Option<Stream>,
    volume: Arc<Mutex<f32>>,
}

// cpal::Stream 本身不是 Send，但我们确保它只在创建它的线程中使用
// Player 在主线程中创建和使用，不会跨线程传递
unsafe impl Send for AudioOutput {}

impl AudioOutput {
    /// 打开默认输出设备
    ///
    /// 设备必须支持解码输出的采样率和声道数（不做采样率转换）；
    /// 采样格式优先 I16，其次 F32。
    pub fn open(format: AudioFormat) -> Result<Self> {
        info!("初始化音频输出: {} Hz, {} 声道", format.sample_rate, format.channels);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::AudioError("无法找到音频输出设备".to_string()))?;

        debug!("使用音频设备: {}", device.name().unwrap_or_default());

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let supported: Vec<SupportedStreamConfigRange> = device
            .supported_output_configs()
            .map_err(|e| PlayerError::AudioError(format!("无法获取支持的音频配置: {}", e)))?
            .filter(|range| Self::is_config_compatible(&config, range))
            .collect();

        let sample_format = [DeviceSampleFormat::I16, DeviceSampleFormat::F32]
            .into_iter()
            .find(|wanted| supported.iter().any(|range| range.sample_format() == *wanted))
            .ok_or_else(|| {
                PlayerError::AudioError(format!(
                    "音频设备不支持 {} Hz, {} 声道",
                    format.sample_rate, format.channels
                ))
            })?;

        debug!("音频输出采样格式: {:?}", sample_format);

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            volume: Arc::new(Mutex::new(1.0)),
        })
    }

    /// 检查配置是否兼容
    fn is_config_compatible(config: &StreamConfig, supported: &SupportedStreamConfigRange) -> bool {
        let rate_in_range = config.sample_rate.0 >= supported.min_sample_rate().0
            && config.sample_rate.0 <= supported.max_sample_rate().0;

        let channels_match = config.channels == supported.channels();

        rate_in_range && channels_match
    }

    /// 开始播放，声卡回调每次按需从 `pull` 拉取 PCM
    pub fn start(&mut self, mut pull: AudioPull) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let volume = self.volume.clone();
        let on_error = |err: cpal::StreamError| error!("{} 音频流错误: {}", log_ctx(), err);

        let stream = match self.sample_format {
            DeviceSampleFormat::F32 => {
                let mut scratch: Vec<i16> = Vec::new();
                self.device.build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(data.len(), 0);
                        pull.fill(bytemuck::cast_slice_mut(&mut scratch[..]));
                        let vol = *volume.lock();
                        for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                            *out = *sample as f32 / 32768.0 * vol;
                        }
                    },
                    on_error,
                    None,
                )
            }
            _ => self.device.build_output_stream(
                &self.config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    pull.fill(bytemuck::cast_slice_mut(data));
                    let vol = *volume.lock();
                    if vol < 1.0 {
                        for sample in data.iter_mut() {
                            *sample = (*sample as f32 * vol) as i16;
                        }
                    }
                },
                on_error,
                None,
            ),
        }
        .map_err(|e| PlayerError::AudioError(format!("创建音频流失败: {}", e)))?;

        stream
            .play()
            .map_err(|e| PlayerError::AudioError(format!("启动音频流失败: {}", e)))?;

        self.stream = Some(stream);
        info!("音频输出已启动");

        Ok(())
    }

    /// 停止播放
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!("音频输出已停止");
        }
    }

    /// 设置音量 (0.0 - 1.0)
    pub fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume.clamp(0.0, 1.0);
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

// 每次拉取 10ms 的数据
const PACED_CHUNKS_PER_SECOND: usize = 100;

/// 无声卡时的音频消费者：按实时速率拉取并丢弃 PCM，保持音频主时钟前进
pub struct PacedPull {
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PacedPull {
    pub fn spawn(mut pull: AudioPull, format: AudioFormat) -> Result<Self> {
        let bytes_per_second = format.bytes_per_second().max(1);
        let frame_bytes =
            (format.channels as usize * format.sample_format.bytes_per_sample()).max(1);
        let chunk_len = ((bytes_per_second / PACED_CHUNKS_PER_SECOND) / frame_bytes).max(1) * frame_bytes;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = stop_flag.clone();

        let thread = thread::Builder::new()
            .name("audio-pull".to_string())
            .spawn(move || {
                info!("{} 🔈 实时音频拉取线程启动（{} 字节/次）", log_ctx(), chunk_len);
                let mut chunk = vec![0u8; chunk_len];
                let start = Instant::now();
                let mut consumed: u64 = 0;

                while !stop.load(Ordering::Acquire) && !pull.is_done() {
                    pull.fill(&mut chunk);
                    consumed += chunk_len as u64;

                    let due = Duration::from_secs_f64(consumed as f64 / bytes_per_second as f64);
                    if let Some(wait) = due.checked_sub(start.elapsed()) {
                        thread::sleep(wait);
                    }
                }
                info!("{} 🛑 实时音频拉取线程退出", log_ctx());
            })
            .map_err(|e| PlayerError::ThreadError(format!("启动音频拉取线程失败: {}", e)))?;

        Ok(Self {
            stop_flag,
            thread: Some(thread),
        })
    }

    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("{} ⚠ 音频拉取线程异常退出", log_ctx());
            }
        }
    }
}

impl Drop for PacedPull {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BoundedQueue, DecodedAudioUnit, PlaybackControl, SyncClocks, TimeBase};

    #[test]
    fn test_paced_pull_consumes_in_real_time() {
        let frames = Arc::new(BoundedQueue::sized());
        // 8000 Hz 单声道 S16：16000 字节/秒，两个 50ms 单元
        for pts in [0, 50] {
            frames.push_unit(DecodedAudioUnit {
                data: vec![1u8; 800],
                pts,
            });
        }
        frames.push_end();
        let control = Arc::new(PlaybackControl::new(true, false));
        control.set_decode_ended(true);
        let clocks = Arc::new(SyncClocks::new());
        let pull = AudioPull::new(frames, control.clone(), clocks.clone(), TimeBase::new(1, 1000));

        let started = Instant::now();
        let mut paced = PacedPull::spawn(pull, AudioFormat::s16(8000, 1)).unwrap();
        while !control.audio_playback_ended() && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        paced.stop();

        assert!(control.audio_playback_ended());
        assert_eq!(clocks.audio(), 50_000);
        // 100ms 的数据不会在 50ms 内被拉完
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
