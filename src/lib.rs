//! MYY 播放器核心：读包、解码、音视频同步和音频拉取

pub mod core;
pub mod player;
