use crate::core::{MediaInfo, PlayerError, Result, TimeBase};
use crate::player::engine::{MediaPacket, PacketSource};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{format, media};
use log::{debug, info};

impl From<ffmpeg::Rational> for TimeBase {
    fn from(r: ffmpeg::Rational) -> Self {
        TimeBase::new(r.numerator(), r.denominator())
    }
}

impl From<TimeBase> for ffmpeg::Rational {
    fn from(tb: TimeBase) -> Self {
        ffmpeg::Rational::new(tb.num, tb.den)
    }
}

impl MediaPacket for ffmpeg::Packet {
    fn stream_index(&self) -> usize {
        self.stream()
    }

    fn rescale_ts(&mut self, from: TimeBase, to: TimeBase) {
        if from != to {
            ffmpeg::Packet::rescale_ts(self, from, to);
        }
    }
}

/// 有理数帧率，非正数返回 None
pub(crate) fn rational_fps(rate: ffmpeg::Rational) -> Option<f64> {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(rate.numerator() as f64 / rate.denominator() as f64)
    } else {
        None
    }
}

/// 解封装器 - 负责读取媒体文件并分离音视频流
pub struct Demuxer {
    input_ctx: format::context::Input,
    video_stream_index: Option<usize>,
    audio_stream_index: Option<usize>,
    media_info: MediaInfo,  // 缓存媒体信息
    source_path: String,    // 媒体源路径（用于描述）
}

impl Demuxer {
    /// 打开媒体文件（或 URL）
    ///
    /// 按容器中的顺序选取最后一个音频流和最后一个视频流；
    /// 两者都不存在时返回 `NoPlayableStream`。
    pub fn open(path: &str) -> Result<Self> {
        info!("正在打开文件: {}", path);

        let input_ctx = format::input(&path)
            .map_err(|e| PlayerError::OpenError(format!("[function]:avformat_open_input [reason]:{}", e)))?;

        let mut video_stream_index = None;
        let mut audio_stream_index = None;
        for stream in input_ctx.streams() {
            match stream.parameters().medium() {
                media::Type::Video => video_stream_index = Some(stream.index()),
                media::Type::Audio => audio_stream_index = Some(stream.index()),
                _ => {}
            }
        }

        if video_stream_index.is_none() && audio_stream_index.is_none() {
            return Err(PlayerError::NoPlayableStream);
        }

        debug!("视频流索引: {:?}", video_stream_index);
        debug!("音频流索引: {:?}", audio_stream_index);

        let mut demuxer = Self {
            input_ctx,
            video_stream_index,
            audio_stream_index,
            media_info: MediaInfo::default(),  // 临时默认值
            source_path: path.to_string(),
        };

        // 获取并缓存媒体信息
        demuxer.media_info = demuxer.extract_media_info()?;

        Ok(demuxer)
    }

    /// 提取媒体信息（内部使用）
    fn extract_media_info(&self) -> Result<MediaInfo> {
        let mut info = MediaInfo {
            duration: self.input_ctx.duration().max(0) / 1000, // 微秒转毫秒
            ..MediaInfo::default()
        };

        if let Some(video_stream) = self.video_stream() {
            let video_codec = video_stream.parameters();
            info.video_codec = video_codec.id().name().to_string();

            let decoder = ffmpeg::codec::context::Context::from_parameters(video_codec)?;
            let video_decoder = decoder.decoder().video()?;
            info.width = video_decoder.width();
            info.height = video_decoder.height();
            info.fps = rational_fps(video_stream.avg_frame_rate()).unwrap_or(0.0);
        }

        if let Some(audio_stream) = self.audio_stream() {
            let audio_codec = audio_stream.parameters();
            info.audio_codec = audio_codec.id().name().to_string();

            let decoder = ffmpeg::codec::context::Context::from_parameters(audio_codec)?;
            let audio_decoder = decoder.decoder().audio()?;
            info.sample_rate = audio_decoder.rate();
            info.channels = audio_decoder.channels();
        }

        Ok(info)
    }

    /// 获取视频流
    pub fn video_stream(&self) -> Option<format::stream::Stream> {
        self.video_stream_index.and_then(|idx| self.input_ctx.stream(idx))
    }

    /// 获取音频流
    pub fn audio_stream(&self) -> Option<format::stream::Stream> {
        self.audio_stream_index.and_then(|idx| self.input_ctx.stream(idx))
    }

    /// 获取媒体信息
    pub fn media_info(&self) -> &MediaInfo {
        &self.media_info
    }
}

impl PacketSource for Demuxer {
    type Packet = ffmpeg::Packet;

    fn read_packet(&mut self) -> Result<Option<ffmpeg::Packet>> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input_ctx) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(PlayerError::ReadError(format!("[function]:av_read_frame [reason]:{}", e))),
        }
    }

    fn description(&self) -> String {
        format!("FFmpeg Demuxer: {}", self.source_path)
    }
}
