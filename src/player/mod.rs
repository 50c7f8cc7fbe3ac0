// 播放器核心模块

pub mod engine;
pub mod idle;
pub mod read_loop;
pub mod decode_worker;
pub mod sync;
pub mod audio_pull;
pub mod pipeline;
pub mod sink;
pub mod demuxer;
pub mod decoder;
pub mod audio_output;
pub mod manager;

pub use engine::{Codec, CodecInput, Converter, FrameSink, MediaPacket, PacketSource, Received};
pub use decode_worker::{audio_cache_budget, video_cache_budget, StreamDecoder};
pub use sync::{sync_decision, SyncAction, SyncDecision};
pub use audio_pull::AudioPull;
pub use pipeline::{Pipeline, PipelineBuilder, PlaybackEvent};
pub use sink::{FrameHandle, LatestFrameSink, RenderedFrame};
pub use demuxer::Demuxer;
pub use audio_output::{AudioOutput, PacedPull};
pub use manager::Player;

use std::{process, thread};

pub(crate) fn log_ctx() -> String {
    format!("[pid:{}-tid:{:?}]", process::id(), thread::current().id())
}
