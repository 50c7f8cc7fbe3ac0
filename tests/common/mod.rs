//! 集成测试用的合成数据源、解码器和渲染端
#![allow(dead_code)]

use myy_core::core::{
    DecodedAudioUnit, DecodedVideoUnit, PlayerError, Result, SyncClocks, TimeBase, VideoFormat,
};
use myy_core::player::{Codec, CodecInput, Converter, FrameSink, MediaPacket, PacketSource, Received};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const VIDEO_STREAM: usize = 0;
pub const AUDIO_STREAM: usize = 1;

pub const MICROS: TimeBase = TimeBase::MICROS;

/// 合成数据包：解码后得到 `size` 字节的单元
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPacket {
    pub stream: usize,
    pub pts: i64,
    pub size: usize,
}

impl SyntheticPacket {
    pub fn audio(pts: i64, size: usize) -> Self {
        Self { stream: AUDIO_STREAM, pts, size }
    }

    pub fn video(pts: i64, size: usize) -> Self {
        Self { stream: VIDEO_STREAM, pts, size }
    }
}

impl MediaPacket for SyntheticPacket {
    fn stream_index(&self) -> usize {
        self.stream
    }

    fn rescale_ts(&mut self, from: TimeBase, to: TimeBase) {
        self.pts = TimeBase::rescale(self.pts, from, to);
    }
}

/// 按脚本返回数据包；脚本读完后报告文件结束
pub struct ScriptedSource {
    script: VecDeque<Result<Option<SyntheticPacket>>>,
}

impl ScriptedSource {
    pub fn new(packets: Vec<SyntheticPacket>) -> Self {
        Self {
            script: packets.into_iter().map(|p| Ok(Some(p))).collect(),
        }
    }

    /// 读完 `packets` 后返回读取错误
    pub fn failing_after(packets: Vec<SyntheticPacket>) -> Self {
        let mut source = Self::new(packets);
        source
            .script
            .push_back(Err(PlayerError::ReadError("synthetic read failure".to_string())));
        source
    }
}

impl PacketSource for ScriptedSource {
    type Packet = SyntheticPacket;

    fn read_packet(&mut self) -> Result<Option<SyntheticPacket>> {
        self.script.pop_front().unwrap_or(Ok(None))
    }

    fn description(&self) -> String {
        format!("scripted source ({} left)", self.script.len())
    }
}

/// 永不结束的数据源（每 1ms 产出一个音频包和一个视频包）
pub struct EndlessSource {
    next_pts: i64,
    toggle: bool,
}

impl EndlessSource {
    pub fn new() -> Self {
        Self { next_pts: 0, toggle: false }
    }
}

impl PacketSource for EndlessSource {
    type Packet = SyntheticPacket;

    fn read_packet(&mut self) -> Result<Option<SyntheticPacket>> {
        self.toggle = !self.toggle;
        if self.toggle {
            Ok(Some(SyntheticPacket::audio(self.next_pts, 640)))
        } else {
            thread::sleep(Duration::from_millis(1));
            let packet = SyntheticPacket::video(self.next_pts, 6);
            self.next_pts += 40_000;
            Ok(Some(packet))
        }
    }

    fn description(&self) -> String {
        "endless source".to_string()
    }
}

/// 解码后的合成帧
#[derive(Debug, Clone)]
pub struct FakeFrame {
    pub pts: i64,
    pub size: usize,
}

/// 每个包解出一帧的解码器，统计 `receive_frame` 调用次数
pub struct FakeCodec {
    pending: VecDeque<FakeFrame>,
    flushed: bool,
    time_base: TimeBase,
    pub receive_calls: Arc<AtomicUsize>,
}

impl FakeCodec {
    pub fn new(time_base: TimeBase) -> Self {
        Self {
            pending: VecDeque::new(),
            flushed: false,
            time_base,
            receive_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Codec for FakeCodec {
    type Packet = SyntheticPacket;
    type Frame = FakeFrame;

    fn send_packet(&mut self, input: CodecInput<SyntheticPacket>) -> Result<()> {
        match input {
            CodecInput::Packet(packet) => self.pending.push_back(FakeFrame {
                pts: packet.pts,
                size: packet.size,
            }),
            CodecInput::Flush => self.flushed = true,
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Received<FakeFrame>> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        Ok(match self.pending.pop_front() {
            Some(frame) => Received::Frame(frame),
            None if self.flushed => Received::EndOfStream,
            None => Received::NeedsInput,
        })
    }

    fn time_base(&self) -> TimeBase {
        self.time_base
    }
}

/// 缓存帧的解码器：手里至少留 `lag` 帧，flush 后才全部吐出。
/// `fail_on_pts` 指定的包不产出帧，紧接着的一次取帧返回错误。
pub struct LaggingCodec {
    pending: VecDeque<FakeFrame>,
    lag: usize,
    flushed: bool,
    fail_on_pts: Option<i64>,
    failure_armed: bool,
    time_base: TimeBase,
    pub failures: Arc<AtomicUsize>,
}

impl LaggingCodec {
    pub fn new(time_base: TimeBase, lag: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            lag,
            flushed: false,
            fail_on_pts: None,
            failure_armed: false,
            time_base,
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_on(mut self, pts: i64) -> Self {
        self.fail_on_pts = Some(pts);
        self
    }
}

impl Codec for LaggingCodec {
    type Packet = SyntheticPacket;
    type Frame = FakeFrame;

    fn send_packet(&mut self, input: CodecInput<SyntheticPacket>) -> Result<()> {
        match input {
            CodecInput::Packet(packet) if Some(packet.pts) == self.fail_on_pts => {
                self.failure_armed = true;
            }
            CodecInput::Packet(packet) => self.pending.push_back(FakeFrame {
                pts: packet.pts,
                size: packet.size,
            }),
            CodecInput::Flush => self.flushed = true,
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Received<FakeFrame>> {
        if self.failure_armed {
            self.failure_armed = false;
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(PlayerError::DecodeError("corrupt packet".to_string()));
        }
        if self.pending.len() > self.lag || (self.flushed && !self.pending.is_empty()) {
            return Ok(Received::Frame(self.pending.pop_front().unwrap()));
        }
        Ok(if self.flushed {
            Received::EndOfStream
        } else {
            Received::NeedsInput
        })
    }

    fn time_base(&self) -> TimeBase {
        self.time_base
    }
}

pub struct ToAudioUnit;

impl Converter<FakeFrame> for ToAudioUnit {
    type Unit = DecodedAudioUnit;

    fn convert(&mut self, frame: FakeFrame) -> Result<DecodedAudioUnit> {
        Ok(DecodedAudioUnit {
            data: vec![1u8; frame.size],
            pts: frame.pts,
        })
    }
}

pub struct ToVideoUnit {
    pub format: VideoFormat,
}

impl Converter<FakeFrame> for ToVideoUnit {
    type Unit = DecodedVideoUnit;

    fn convert(&mut self, frame: FakeFrame) -> Result<DecodedVideoUnit> {
        Ok(DecodedVideoUnit {
            data: vec![0u8; frame.size],
            stride: self.format.width as usize,
            pts: frame.pts,
        })
    }
}

/// 一次显示记录：视频 PTS（微秒）和显示时刻的音频时钟
#[derive(Debug, Clone, Copy)]
pub struct Presented {
    pub video_us: i64,
    pub audio_us: i64,
}

/// 记录每次显示的渲染端
pub struct RecordingSink {
    clocks: Arc<SyncClocks>,
    time_base: TimeBase,
    pub log: Arc<Mutex<Vec<Presented>>>,
}

impl RecordingSink {
    pub fn new(clocks: Arc<SyncClocks>, time_base: TimeBase) -> Self {
        Self {
            clocks,
            time_base,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FrameSink for RecordingSink {
    fn configure(&mut self, _format: VideoFormat) {}

    fn present(&mut self, unit: &DecodedVideoUnit) {
        self.log.lock().push(Presented {
            video_us: self.time_base.to_micros(unit.pts),
            audio_us: self.clocks.audio(),
        });
    }
}

/// 什么也不做的渲染端
pub struct NullSink;

impl FrameSink for NullSink {
    fn configure(&mut self, _format: VideoFormat) {}

    fn present(&mut self, _unit: &DecodedVideoUnit) {}
}
