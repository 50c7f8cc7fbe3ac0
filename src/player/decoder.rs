use crate::core::{
    AudioFormat, DecodedAudioUnit, DecodedVideoUnit, PlayerError, Result, TimeBase, VideoFormat,
};
use crate::player::demuxer::rational_fps;
use crate::player::engine::{Codec, CodecInput, Converter, Received};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::error::EAGAIN;
use ffmpeg_next::{codec, format, software, util};
use log::debug;

fn frame_pts(frame: &util::frame::Frame) -> i64 {
    frame.pts().or_else(|| frame.timestamp()).unwrap_or(0)
}

/// 打开解码器，数据包时间基使用流时间基
fn open_decoder(stream: &format::stream::Stream) -> Result<(codec::decoder::Decoder, TimeBase)> {
    let context = codec::context::Context::from_parameters(stream.parameters())?;
    let mut decoder = context.decoder();
    decoder.set_packet_time_base(stream.time_base());
    Ok((decoder, stream.time_base().into()))
}

fn map_receive<F>(result: std::result::Result<(), ffmpeg::Error>, frame: F) -> Result<Received<F>> {
    match result {
        Ok(()) => Ok(Received::Frame(frame)),
        Err(ffmpeg::Error::Other { errno }) if errno == EAGAIN => Ok(Received::NeedsInput),
        Err(ffmpeg::Error::Eof) => Ok(Received::EndOfStream),
        Err(e) => Err(e.into()),
    }
}

fn map_send(result: std::result::Result<(), ffmpeg::Error>, kind: &str) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(ffmpeg::Error::Eof) => {
            debug!("{} 解码器已收到 EOF，忽略本次输入", kind);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// 视频解码器
pub struct VideoCodec {
    decoder: codec::decoder::Video,
    time_base: TimeBase,
}

// 解码器上下文只在对应的解码线程中使用
unsafe impl Send for VideoCodec {}

impl VideoCodec {
    /// 从视频流创建解码器，同时返回输出格式和解码器声明的帧率
    pub fn from_stream(stream: &format::stream::Stream) -> Result<(Self, VideoFormat, Option<f64>)> {
        let (decoder, time_base) = open_decoder(stream)?;
        let decoder = decoder.video()?;

        debug!(
            "视频解码器: {}x{}, 格式: {:?}",
            decoder.width(),
            decoder.height(),
            decoder.format()
        );

        let format = VideoFormat::yuv420p(decoder.width(), decoder.height());
        let codec_fps = decoder.frame_rate().and_then(rational_fps);
        Ok((Self { decoder, time_base }, format, codec_fps))
    }
}

impl Codec for VideoCodec {
    type Packet = ffmpeg::Packet;
    type Frame = util::frame::Video;

    fn send_packet(&mut self, input: CodecInput<ffmpeg::Packet>) -> Result<()> {
        let result = match input {
            CodecInput::Packet(packet) => self.decoder.send_packet(&packet),
            CodecInput::Flush => self.decoder.send_eof(),
        };
        map_send(result, "视频")
    }

    fn receive_frame(&mut self) -> Result<Received<util::frame::Video>> {
        let mut frame = util::frame::Video::empty();
        let result = self.decoder.receive_frame(&mut frame);
        map_receive(result, frame)
    }

    fn time_base(&self) -> TimeBase {
        self.time_base
    }
}

/// 音频解码器
pub struct AudioCodec {
    decoder: codec::decoder::Audio,
    time_base: TimeBase,
}

unsafe impl Send for AudioCodec {}

impl AudioCodec {
    /// 从音频流创建解码器，输出格式为 S16，保持原采样率和声道数
    pub fn from_stream(stream: &format::stream::Stream) -> Result<(Self, AudioFormat)> {
        let (decoder, time_base) = open_decoder(stream)?;
        let decoder = decoder.audio()?;

        debug!(
            "音频解码器: {} Hz, {} 声道, 格式: {:?}",
            decoder.rate(),
            decoder.channels(),
            decoder.format()
        );

        let format = AudioFormat::s16(decoder.rate(), decoder.channels());
        Ok((Self { decoder, time_base }, format))
    }
}

impl Codec for AudioCodec {
    type Packet = ffmpeg::Packet;
    type Frame = util::frame::Audio;

    fn send_packet(&mut self, input: CodecInput<ffmpeg::Packet>) -> Result<()> {
        let result = match input {
            CodecInput::Packet(packet) => self.decoder.send_packet(&packet),
            CodecInput::Flush => self.decoder.send_eof(),
        };
        map_send(result, "音频")
    }

    fn receive_frame(&mut self) -> Result<Received<util::frame::Audio>> {
        let mut frame = util::frame::Audio::empty();
        let result = self.decoder.receive_frame(&mut frame);
        map_receive(result, frame)
    }

    fn time_base(&self) -> TimeBase {
        self.time_base
    }
}

/// 像素格式转换（任意格式 → YUV420P，分辨率不变）
pub struct VideoScaler {
    format: VideoFormat,
    scaler: Option<software::scaling::Context>,
}

// SwsContext 本身不是 Send，但我们确保只在单个线程中使用它
// 这是安全的，因为每个转换器实例只会在对应的解码线程中使用
unsafe impl Send for VideoScaler {}

impl VideoScaler {
    pub fn new(format: VideoFormat) -> Self {
        Self { format, scaler: None }
    }

    /// 把一个平面按行拷贝到连续内存（去掉行填充）
    fn copy_plane(dst: &mut Vec<u8>, src: &[u8], stride: usize, row_bytes: usize, rows: usize) {
        for y in 0..rows {
            let start = y * stride;
            dst.extend_from_slice(&src[start..start + row_bytes]);
        }
    }
}

impl Converter<util::frame::Video> for VideoScaler {
    type Unit = DecodedVideoUnit;

    fn convert(&mut self, frame: util::frame::Video) -> Result<DecodedVideoUnit> {
        let (width, height) = (self.format.width, self.format.height);

        // 初始化 scaler（源格式 -> YUV420P）
        if self.scaler.is_none() {
            self.scaler = Some(software::scaling::Context::get(
                frame.format(),
                frame.width(),
                frame.height(),
                util::format::Pixel::YUV420P,
                width,
                height,
                software::scaling::Flags::BILINEAR,
            )?);
        }
        let scaler = self
            .scaler
            .as_mut()
            .ok_or_else(|| PlayerError::DecodeError("scaler 未初始化".to_string()))?;

        let mut yuv_frame = util::frame::Video::empty();
        scaler.run(&frame, &mut yuv_frame)?;

        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = ((w + 1) / 2, (h + 1) / 2);
        let mut data = Vec::with_capacity(w * h + 2 * cw * ch);
        Self::copy_plane(&mut data, yuv_frame.data(0), yuv_frame.stride(0), w, h);
        Self::copy_plane(&mut data, yuv_frame.data(1), yuv_frame.stride(1), cw, ch);
        Self::copy_plane(&mut data, yuv_frame.data(2), yuv_frame.stride(2), cw, ch);

        Ok(DecodedVideoUnit {
            data,
            stride: w,
            pts: frame_pts(&frame),
        })
    }
}

/// 音频重采样（任意采样格式 → S16 交错，采样率和声道不变）
pub struct AudioResampler {
    format: AudioFormat,
    resampler: Option<software::resampling::Context>,
}

// SwrContext 同样只在音频解码线程中使用
unsafe impl Send for AudioResampler {}

impl AudioResampler {
    pub fn new(format: AudioFormat) -> Self {
        Self { format, resampler: None }
    }
}

impl Converter<util::frame::Audio> for AudioResampler {
    type Unit = DecodedAudioUnit;

    fn convert(&mut self, mut frame: util::frame::Audio) -> Result<DecodedAudioUnit> {
        // 部分解码器不填声道布局，按声道数补上默认布局
        if frame.channel_layout().is_empty() {
            frame.set_channel_layout(util::channel_layout::ChannelLayout::default(
                self.format.channels as i32,
            ));
        }

        // 初始化 resampler
        if self.resampler.is_none() {
            debug!(
                "🔧 初始化音频重采样器: {:?} {}Hz/{}ch → S16",
                frame.format(),
                frame.rate(),
                frame.channels()
            );
            self.resampler = Some(software::resampling::Context::get(
                frame.format(),
                frame.channel_layout(),
                frame.rate(),
                util::format::Sample::I16(util::format::sample::Type::Packed),
                frame.channel_layout(),
                self.format.sample_rate,
            )?);
        }
        let resampler = self
            .resampler
            .as_mut()
            .ok_or_else(|| PlayerError::DecodeError("resampler 未初始化".to_string()))?;

        let mut resampled = util::frame::Audio::empty();
        resampler.run(&frame, &mut resampled)?;

        let len = resampled.samples()
            * self.format.channels as usize
            * self.format.sample_format.bytes_per_sample();
        let plane = resampled.data(0);
        let data = plane[..len.min(plane.len())].to_vec();

        Ok(DecodedAudioUnit {
            data,
            pts: frame_pts(&frame),
        })
    }
}
