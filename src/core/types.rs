use serde::{Deserialize, Serialize};

/// 公共时间单位：微秒（与 FFmpeg 的 AV_TIME_BASE 一致）
pub const AV_TIME_BASE: i32 = 1_000_000;

/// 时间基（有理数），把流内部的 tick 换算为秒
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    /// 微秒时间基 1/1000000
    pub const MICROS: TimeBase = TimeBase { num: 1, den: AV_TIME_BASE };

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// ts * from / to，四舍五入（远离零），与 av_rescale_q 行为一致
    pub fn rescale(ts: i64, from: TimeBase, to: TimeBase) -> i64 {
        let num = ts as i128 * from.num as i128 * to.den as i128;
        let den = from.den as i128 * to.num as i128;
        if den == 0 {
            return 0;
        }

        let half = den.abs() / 2;
        let magnitude = (num.abs() + half) / den.abs();
        let q = if (num < 0) != (den < 0) { -magnitude } else { magnitude };

        q.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// 换算到微秒
    pub fn to_micros(&self, ts: i64) -> i64 {
        Self::rescale(ts, *self, Self::MICROS)
    }
}

/// 流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// 队列按字节计量的单元
pub trait ByteSized {
    fn byte_size(&self) -> usize;
}

/// 解码 + 重采样后的音频数据（PCM 字节）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAudioUnit {
    pub data: Vec<u8>,
    /// 解码器时间基下的 PTS
    pub pts: i64,
}

impl ByteSized for DecodedAudioUnit {
    fn byte_size(&self) -> usize {
        self.data.len()
    }
}

/// 解码 + 像素格式转换后的视频数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVideoUnit {
    pub data: Vec<u8>,
    /// 亮度平面每行字节数
    pub stride: usize,
    /// 解码器时间基下的 PTS
    pub pts: i64,
}

impl ByteSized for DecodedVideoUnit {
    fn byte_size(&self) -> usize {
        self.data.len()
    }
}

/// 像素格式（输出格式固定为 YUV420P）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    YUV420P,
}

/// 音频采样格式（输出格式固定为 S16 交错）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    I16,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::I16 => 2,
        }
    }
}

/// 输出音频格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    pub fn s16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format: SampleFormat::I16,
        }
    }

    /// 一秒 PCM 的字节数
    pub fn bytes_per_second(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample() * self.sample_rate as usize
    }
}

/// 输出视频格式（交给渲染端）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl VideoFormat {
    pub fn yuv420p(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_format: PixelFormat::YUV420P,
        }
    }

    /// 一帧的字节数（4:2:0 平面格式）
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3 / 2
    }
}

/// 缓冲状态信息（用于监控和调试）
#[derive(Debug, Clone, Default, Serialize)]
pub struct BufferStatus {
    /// 视频数据包队列长度
    pub video_packets: usize,

    /// 音频数据包队列长度
    pub audio_packets: usize,

    /// 视频帧队列长度
    pub video_frames: usize,

    /// 音频帧队列长度
    pub audio_frames: usize,

    /// 视频帧队列字节数
    pub video_frame_bytes: usize,

    /// 音频帧队列字节数
    pub audio_frame_bytes: usize,
}

/// 媒体信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration: i64,          // 总时长（毫秒）
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for MediaInfo {
    fn default() -> Self {
        Self {
            duration: 0,
            width: 0,
            height: 0,
            fps: 0.0,
            video_codec: "none".to_string(),
            audio_codec: "none".to_string(),
            sample_rate: 0,
            channels: 0,
        }
    }
}
