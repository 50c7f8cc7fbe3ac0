use crate::core::{
    AudioFormat, BoundedQueue, MediaKind, PlaybackControl, PlayerError, PopResult, Result,
    TimeBase, VideoFormat,
};
use crate::player::engine::{Codec, CodecInput, Converter, MediaPacket, Received};
use crate::player::idle::IdleWait;
use crate::player::log_ctx;
use crate::player::read_loop::PacketQueue;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// 解码后帧队列（按字节计量）
pub type FrameQueue<U> = BoundedQueue<U>;

/// 容器和解码器都没有给出帧率时使用的默认值
pub const DEFAULT_FPS: f64 = 30.0;

/// 音频缓存上限 = 声道数 × 每样本字节数 × 采样率 × 预加载秒数
pub fn audio_cache_budget(format: &AudioFormat, preload_seconds: f64) -> usize {
    (format.bytes_per_second() as f64 * preload_seconds) as usize
}

/// 视频缓存上限 = 一帧字节数 × 帧率 × 预加载秒数
///
/// 帧率优先取容器声明的平均帧率，其次取解码器帧率，都不可用时按 30fps。
pub fn video_cache_budget(
    format: &VideoFormat,
    avg_frame_rate: Option<f64>,
    codec_frame_rate: Option<f64>,
    preload_seconds: f64,
) -> usize {
    let fps = [avg_frame_rate, codec_frame_rate]
        .into_iter()
        .flatten()
        .find(|fps| fps.is_finite() && *fps > 0.0)
        .unwrap_or(DEFAULT_FPS);
    (format.frame_size() as f64 * fps * preload_seconds) as usize
}

/// 一路流的解码适配器：解码器 + 格式转换 + 缓存预算
pub struct StreamDecoder<C, X> {
    pub kind: MediaKind,
    pub codec: C,
    pub converter: X,
    /// 容器中该流的时间基（数据包时间戳的单位）
    pub stream_time_base: TimeBase,
    /// 帧队列字节上限，达到后暂停解码（背压）
    pub cache_budget: usize,
}

/// 一次取帧的结果
enum Drain {
    NeedsInput,
    Overloaded,
    EndOfStream,
}

impl<C, X> StreamDecoder<C, X>
where
    C: Codec,
    X: Converter<C::Frame>,
{
    pub fn new(kind: MediaKind, codec: C, converter: X, stream_time_base: TimeBase, cache_budget: usize) -> Self {
        Self {
            kind,
            codec,
            converter,
            stream_time_base,
            cache_budget,
        }
    }

    /// 解码器时间基（帧 PTS 的单位）
    pub fn codec_time_base(&self) -> TimeBase {
        self.codec.time_base()
    }

    fn is_overloaded(&self, frames: &FrameQueue<X::Unit>) -> bool {
        frames.current_byte_total() >= self.cache_budget
    }

    /// 取完解码器中已有的帧，转换后压入帧队列
    fn drain(&mut self, frames: &FrameQueue<X::Unit>, pushed: &mut usize) -> Drain {
        loop {
            if self.is_overloaded(frames) {
                return Drain::Overloaded;
            }
            match self.codec.receive_frame() {
                Ok(Received::Frame(frame)) => match self.converter.convert(frame) {
                    Ok(unit) => {
                        frames.push_unit(unit);
                        *pushed += 1;
                    }
                    Err(e) => warn!("{} {} 帧转换失败（已跳过）: {}", log_ctx(), self.kind.as_str(), e),
                },
                Ok(Received::NeedsInput) => return Drain::NeedsInput,
                Ok(Received::EndOfStream) => return Drain::EndOfStream,
                Err(e) => {
                    error!("{} [function]:receive_frame({}) [reason]:{}", log_ctx(), self.kind.as_str(), e);
                    return Drain::NeedsInput;
                }
            }
        }
    }

    /// 解码循环
    ///
    /// 帧队列字节数达到上限时本轮不做任何工作（轮询等待消费端取走数据）。
    /// 否则先取完解码器缓存的帧；解码器需要输入时从包队列取一个包：
    /// 普通包换算时间基后送入，`EndOfStream` 则送入 flush。
    /// 解码器在 flush 后报告结束时退出，并置位对应的 decode-ended。
    pub fn run(
        mut self,
        packets: &PacketQueue<C::Packet>,
        frames: &FrameQueue<X::Unit>,
        control: &PlaybackControl,
        idle: &IdleWait,
    ) {
        let kind = self.kind.as_str();
        info!("{} 🎞 {} 解码线程启动（缓存上限 {} 字节）", log_ctx(), kind, self.cache_budget);

        let codec_time_base = self.codec.time_base();
        let mut flushed = false;
        let mut pushed: usize = 0;

        while !control.abort_requested() {
            if self.is_overloaded(frames) {
                idle.wait();
                continue;
            }

            match self.drain(frames, &mut pushed) {
                Drain::Overloaded => {
                    idle.wait();
                    continue;
                }
                Drain::EndOfStream => {
                    info!("{} 📄 {} 解码器已输出全部帧", log_ctx(), kind);
                    break;
                }
                Drain::NeedsInput if flushed => {
                    debug!("{} {} flush 后解码器仍请求输入，视为结束", log_ctx(), kind);
                    break;
                }
                Drain::NeedsInput => {}
            }

            match packets.pop() {
                PopResult::Unit(mut packet) => {
                    packet.rescale_ts(self.stream_time_base, codec_time_base);
                    if let Err(e) = self.codec.send_packet(CodecInput::Packet(packet)) {
                        error!("{} [function]:send_packet({}) [reason]:{}", log_ctx(), kind, e);
                    }
                    idle.reset();
                }
                PopResult::EndOfStream => {
                    debug!("{} {} 包队列结束，flush 解码器", log_ctx(), kind);
                    if let Err(e) = self.codec.send_packet(CodecInput::Flush) {
                        error!("{} [function]:send_packet(flush, {}) [reason]:{}", log_ctx(), kind, e);
                    }
                    flushed = true;
                }
                PopResult::Empty => idle.wait(),
            }
        }

        control.set_decode_ended(self.kind == MediaKind::Audio);
        info!("{} 🛑 {} 解码线程结束（共输出 {} 帧）", log_ctx(), kind, pushed);
    }
}

/// 启动解码线程
pub fn spawn<C, X>(
    decoder: StreamDecoder<C, X>,
    packets: Arc<PacketQueue<C::Packet>>,
    frames: Arc<FrameQueue<X::Unit>>,
    control: Arc<PlaybackControl>,
    idle_backoff: bool,
) -> Result<JoinHandle<()>>
where
    C: Codec + 'static,
    X: Converter<C::Frame> + 'static,
{
    let name = format!("{}-decode", decoder.kind.as_str());
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let idle = IdleWait::new(idle_backoff);
            decoder.run(&packets, &frames, &control, &idle);
        })
        .map_err(|e| PlayerError::ThreadError(format!("启动 {} 线程失败: {}", name, e)))
}
