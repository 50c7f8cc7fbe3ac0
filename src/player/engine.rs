use crate::core::{ByteSized, DecodedVideoUnit, Result, TimeBase, VideoFormat};

/// 解封装得到的压缩数据包（可跨线程传递）
pub trait MediaPacket: Send + 'static {
    /// 所属流索引
    fn stream_index(&self) -> usize;

    /// 将包内时间戳从一个时间基换算到另一个
    fn rescale_ts(&mut self, from: TimeBase, to: TimeBase);
}

/// 数据包来源（解封装器）抽象接口
///
/// 不同的媒体源（FFmpeg 文件、测试用合成源等）实现这个接口
pub trait PacketSource: Send {
    type Packet: MediaPacket;

    /// 读取下一个媒体包
    ///
    /// 返回：
    /// - Ok(Some(packet)): 成功读取一个包
    /// - Ok(None): 到达文件末尾
    /// - Err(e): 读取错误
    fn read_packet(&mut self) -> Result<Option<Self::Packet>>;

    /// 获取描述信息（用于调试）
    fn description(&self) -> String;
}

/// 送入解码器的输入
pub enum CodecInput<P> {
    Packet(P),
    /// 无更多输入，让解码器吐出剩余缓存帧
    Flush,
}

/// 向解码器取帧的结果
#[derive(Debug)]
pub enum Received<F> {
    Frame(F),
    /// 需要更多输入（EAGAIN），不是错误
    NeedsInput,
    /// flush 之后解码器已彻底结束
    EndOfStream,
}

/// 单路解码器（send-packet / receive-frame 模型）
pub trait Codec: Send {
    type Packet: MediaPacket;
    type Frame;

    fn send_packet(&mut self, input: CodecInput<Self::Packet>) -> Result<()>;

    fn receive_frame(&mut self) -> Result<Received<Self::Frame>>;

    /// 解码器时间基，输出帧的 PTS 以此为单位
    fn time_base(&self) -> TimeBase;
}

/// 帧格式转换（音频重采样 / 视频像素格式转换）
pub trait Converter<F>: Send {
    type Unit: ByteSized + Send + 'static;

    fn convert(&mut self, frame: F) -> Result<Self::Unit>;
}

/// 渲染端：接收完成的视频帧，交接不应阻塞
pub trait FrameSink: Send {
    /// 声明输出格式和分辨率
    fn configure(&mut self, format: VideoFormat);

    fn present(&mut self, unit: &DecodedVideoUnit);
}
