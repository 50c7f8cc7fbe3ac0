use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("FFmpeg 错误: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("无法打开文件: {0}")]
    OpenError(String),

    /// 音频流和视频流都不存在
    #[error("找不到可播放的音频流或视频流")]
    NoPlayableStream,

    #[error("读取数据包失败: {0}")]
    ReadError(String),

    #[error("解码错误: {0}")]
    DecodeError(String),

    #[error("音频输出错误: {0}")]
    AudioError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("线程错误: {0}")]
    ThreadError(String),
}

impl PlayerError {
    /// 打开阶段的致命错误（OpenFailure / NoPlayableStream）
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            PlayerError::OpenError(_) | PlayerError::NoPlayableStream
        )
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
