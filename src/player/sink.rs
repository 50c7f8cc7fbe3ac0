use crate::core::{DecodedVideoUnit, VideoFormat};
use crate::player::engine::FrameSink;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

/// 渲染端持有的帧缓冲
#[derive(Debug, Clone, Default)]
pub struct RenderedFrame {
    pub data: Vec<u8>,
    pub stride: usize,
    pub pts: i64,
    /// 从 1 开始的显示序号
    pub sequence: u64,
}

#[derive(Default)]
struct FrameSlot {
    format: Option<VideoFormat>,
    frame: Option<RenderedFrame>,
}

/// 最新帧渲染端：把帧拷贝到自己的缓冲区，并发出"帧就绪"通知
///
/// 通知通道容量为 1，`present` 永不阻塞；显示端只关心最新一帧。
pub struct LatestFrameSink {
    slot: Arc<Mutex<FrameSlot>>,
    ready_tx: Sender<u64>,
    sequence: u64,
}

/// 显示端句柄（UI 线程持有）
#[derive(Clone)]
pub struct FrameHandle {
    slot: Arc<Mutex<FrameSlot>>,
    ready_rx: Receiver<u64>,
}

impl LatestFrameSink {
    pub fn new() -> (Self, FrameHandle) {
        let slot = Arc::new(Mutex::new(FrameSlot::default()));
        let (ready_tx, ready_rx) = bounded(1);
        (
            Self {
                slot: slot.clone(),
                ready_tx,
                sequence: 0,
            },
            FrameHandle { slot, ready_rx },
        )
    }
}

impl FrameSink for LatestFrameSink {
    fn configure(&mut self, format: VideoFormat) {
        self.slot.lock().format = Some(format);
    }

    fn present(&mut self, unit: &DecodedVideoUnit) {
        self.sequence += 1;
        {
            let mut slot = self.slot.lock();
            let frame = slot.frame.get_or_insert_with(RenderedFrame::default);
            frame.data.clear();
            frame.data.extend_from_slice(&unit.data);
            frame.stride = unit.stride;
            frame.pts = unit.pts;
            frame.sequence = self.sequence;
        }
        // 通道已满说明显示端还没取走上一条通知，丢弃即可
        let _ = self.ready_tx.try_send(self.sequence);
    }
}

impl FrameHandle {
    /// "帧就绪"通知
    pub fn ready(&self) -> &Receiver<u64> {
        &self.ready_rx
    }

    pub fn format(&self) -> Option<VideoFormat> {
        self.slot.lock().format
    }

    /// 获取最新一帧的拷贝
    pub fn latest(&self) -> Option<RenderedFrame> {
        self.slot.lock().frame.clone()
    }
}
