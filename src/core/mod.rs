// 核心数据结构和类型定义

pub mod types;
pub mod clock;
pub mod error;
pub mod queue;
pub mod control;
pub mod config;

pub use types::*;
pub use clock::*;
pub use error::*;
pub use queue::{BoundedQueue, PopResult, QueueItem, QueueState};
pub use control::PlaybackControl;
pub use config::{PlayerConfig, PRELOAD_SECONDS};
