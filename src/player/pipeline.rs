use crate::core::{
    BoundedQueue, BufferStatus, DecodedAudioUnit, DecodedVideoUnit, MediaKind, PlaybackControl,
    PlayerConfig, PlayerError, Result, SyncClocks, TimeBase, VideoFormat, WallClock,
};
use crate::player::audio_pull::AudioPull;
use crate::player::decode_worker::{self, FrameQueue, StreamDecoder};
use crate::player::engine::{Codec, Converter, FrameSink, PacketSource};
use crate::player::log_ctx;
use crate::player::read_loop::{self, PacketQueue, PacketRoute, ReadRoutes};
use crate::player::sync::{self, MasterClock, SyncCoordinator, VideoInput};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::JoinHandle;

/// 对外可见的播放事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// 所有工作线程已启动
    DataReady,
    /// 音频、视频都已播放完成。`read_failed` 为 true 表示读包出错提前结束，
    /// 默认情况下调用方可以忽略该字段
    Finished { read_failed: bool },
    /// 收到中止请求，同步协调线程已退出
    Stopped,
}

/// 发送播放事件；接收端已关闭时只记录日志，返回是否送达
pub(crate) fn send_event(events: &Sender<PlaybackEvent>, event: PlaybackEvent) -> bool {
    if events.send(event).is_err() {
        debug!("{} 事件接收端已关闭，丢弃 {:?}", log_ctx(), event);
        return false;
    }
    true
}

type Launcher<P, U> = Box<
    dyn FnOnce(Arc<PacketQueue<P>>, Arc<FrameQueue<U>>, Arc<PlaybackControl>, bool) -> Result<JoinHandle<()>>
        + Send,
>;

/// 一路待启动的流
struct StreamSlot<P, U> {
    stream_index: usize,
    time_base: TimeBase,
    launch: Launcher<P, U>,
}

impl<P, U> StreamSlot<P, U>
where
    P: Send + 'static,
    U: Send + 'static,
{
    fn new<C, X>(stream_index: usize, decoder: StreamDecoder<C, X>) -> Self
    where
        C: Codec<Packet = P> + 'static,
        X: Converter<C::Frame, Unit = U> + 'static,
    {
        Self {
            stream_index,
            time_base: decoder.codec_time_base(),
            launch: Box::new(move |packets, frames, control, idle_backoff| {
                decode_worker::spawn(decoder, packets, frames, control, idle_backoff)
            }),
        }
    }
}

/// 播放流水线构建器：一次打开的媒体会话，每个角色恰好一个线程
pub struct PipelineBuilder<S: PacketSource> {
    source: S,
    config: PlayerConfig,
    clocks: Arc<SyncClocks>,
    audio: Option<StreamSlot<S::Packet, DecodedAudioUnit>>,
    video: Option<(StreamSlot<S::Packet, DecodedVideoUnit>, VideoFormat)>,
}

impl<S> PipelineBuilder<S>
where
    S: PacketSource + 'static,
{
    pub fn new(source: S, config: PlayerConfig) -> Self {
        Self {
            source,
            config,
            clocks: Arc::new(SyncClocks::new()),
            audio: None,
            video: None,
        }
    }

    /// 本次会话共享的音视频时钟（启动前即可交给渲染端读取）
    pub fn clocks(&self) -> Arc<SyncClocks> {
        self.clocks.clone()
    }

    pub fn audio<C, X>(mut self, stream_index: usize, decoder: StreamDecoder<C, X>) -> Self
    where
        C: Codec<Packet = S::Packet> + 'static,
        X: Converter<C::Frame, Unit = DecodedAudioUnit> + 'static,
    {
        self.audio = Some(StreamSlot::new(stream_index, decoder));
        self
    }

    pub fn video<C, X>(mut self, stream_index: usize, format: VideoFormat, decoder: StreamDecoder<C, X>) -> Self
    where
        C: Codec<Packet = S::Packet> + 'static,
        X: Converter<C::Frame, Unit = DecodedVideoUnit> + 'static,
    {
        self.video = Some((StreamSlot::new(stream_index, decoder), format));
        self
    }

    /// 启动四个工作线程：音频解码、视频解码、读包、同步协调
    pub fn start(self, mut sink: Box<dyn FrameSink>) -> Result<Pipeline<S::Packet>> {
        let PipelineBuilder {
            source,
            config,
            clocks,
            audio,
            video,
        } = self;

        if audio.is_none() && video.is_none() {
            return Err(PlayerError::NoPlayableStream);
        }

        let control = Arc::new(PlaybackControl::new(audio.is_some(), video.is_some()));
        let (events_tx, events_rx) = unbounded();
        let idle_backoff = config.idle_backoff;

        let mut pipeline = Pipeline {
            control: control.clone(),
            clocks,
            events: events_rx,
            audio_packets: None,
            video_packets: None,
            audio_frames: None,
            video_frames: None,
            audio_time_base: None,
            audio_pull_taken: false,
            audio_decode_thread: None,
            video_decode_thread: None,
            sync_thread: None,
            read_thread: None,
        };

        let mut routes = ReadRoutes { audio: None, video: None };

        if let Some(slot) = audio {
            let packets = Arc::new(BoundedQueue::counted());
            let frames = Arc::new(BoundedQueue::sized());
            pipeline.audio_decode_thread =
                Some((slot.launch)(packets.clone(), frames.clone(), control.clone(), idle_backoff)?);
            routes.audio = Some(PacketRoute {
                stream_index: slot.stream_index,
                queue: packets.clone(),
            });
            pipeline.audio_packets = Some(packets);
            pipeline.audio_frames = Some(frames);
            pipeline.audio_time_base = Some(slot.time_base);
        }

        let mut video_input = None;
        if let Some((slot, format)) = video {
            let packets = Arc::new(BoundedQueue::counted());
            let frames = Arc::new(BoundedQueue::sized());
            sink.configure(format);
            pipeline.video_decode_thread =
                Some((slot.launch)(packets.clone(), frames.clone(), control.clone(), idle_backoff)?);
            routes.video = Some(PacketRoute {
                stream_index: slot.stream_index,
                queue: packets.clone(),
            });
            video_input = Some(VideoInput {
                frames: frames.clone(),
                time_base: slot.time_base,
            });
            pipeline.video_packets = Some(packets);
            pipeline.video_frames = Some(frames);
        }

        pipeline.read_thread = Some(read_loop::spawn(source, routes, control.clone())?);

        let master = if control.has_audio() {
            MasterClock::Audio
        } else {
            MasterClock::Wall(WallClock::new())
        };
        let coordinator = SyncCoordinator::new(
            control.clone(),
            pipeline.clocks.clone(),
            video_input,
            master,
            sink,
            events_tx.clone(),
        );
        pipeline.sync_thread = Some(sync::spawn(coordinator, idle_backoff)?);

        info!(
            "{} ✅ 播放流水线已启动（音频: {}, 视频: {}）",
            log_ctx(),
            control.has_audio(),
            control.has_video()
        );
        send_event(&events_tx, PlaybackEvent::DataReady);

        Ok(pipeline)
    }
}

/// 运行中的播放流水线
pub struct Pipeline<P> {
    control: Arc<PlaybackControl>,
    clocks: Arc<SyncClocks>,
    events: Receiver<PlaybackEvent>,

    audio_packets: Option<Arc<PacketQueue<P>>>,
    video_packets: Option<Arc<PacketQueue<P>>>,
    audio_frames: Option<Arc<FrameQueue<DecodedAudioUnit>>>,
    video_frames: Option<Arc<FrameQueue<DecodedVideoUnit>>>,
    audio_time_base: Option<TimeBase>,
    audio_pull_taken: bool,

    audio_decode_thread: Option<JoinHandle<()>>,
    video_decode_thread: Option<JoinHandle<()>>,
    sync_thread: Option<JoinHandle<()>>,
    read_thread: Option<JoinHandle<()>>,
}

impl<P> Pipeline<P> {
    /// 取出音频拉取接口（交给音频输出端），每个会话只能取一次
    pub fn take_audio_pull(&mut self) -> Option<AudioPull> {
        if self.audio_pull_taken {
            return None;
        }
        let frames = self.audio_frames.clone()?;
        let time_base = self.audio_time_base?;
        self.audio_pull_taken = true;
        Some(AudioPull::new(
            frames,
            self.control.clone(),
            self.clocks.clone(),
            time_base,
        ))
    }

    pub fn events(&self) -> &Receiver<PlaybackEvent> {
        &self.events
    }

    pub fn control(&self) -> &Arc<PlaybackControl> {
        &self.control
    }

    pub fn clocks(&self) -> &Arc<SyncClocks> {
        &self.clocks
    }

    pub fn is_finished(&self) -> bool {
        self.control.playback_ended()
    }

    /// 获取缓冲状态
    pub fn buffer_status(&self) -> BufferStatus {
        BufferStatus {
            video_packets: self.video_packets.as_ref().map_or(0, |q| q.len()),
            audio_packets: self.audio_packets.as_ref().map_or(0, |q| q.len()),
            video_frames: self.video_frames.as_ref().map_or(0, |q| q.len()),
            audio_frames: self.audio_frames.as_ref().map_or(0, |q| q.len()),
            video_frame_bytes: self.video_frames.as_ref().map_or(0, |q| q.current_byte_total()),
            audio_frame_bytes: self.audio_frames.as_ref().map_or(0, |q| q.current_byte_total()),
        }
    }

    /// 停止播放：置位中止标记并按顺序等待线程退出
    ///
    /// 先等两个解码线程（各自的资源在其退出后才能释放），再等同步协调线程，
    /// 读包线程最后退出。中止不会打断正在进行的读包、解码调用或同步休眠。
    pub fn stop(&mut self) {
        if self.audio_decode_thread.is_none()
            && self.video_decode_thread.is_none()
            && self.sync_thread.is_none()
            && self.read_thread.is_none()
        {
            return;
        }

        info!("{} 🛑 停止播放流水线", log_ctx());
        self.control.request_abort();

        join(self.audio_decode_thread.take(), MediaKind::Audio.as_str());
        join(self.video_decode_thread.take(), MediaKind::Video.as_str());
        join(self.sync_thread.take(), "av-sync");
        join(self.read_thread.take(), "read");

        for (queue, name) in [(&self.audio_packets, "audio"), (&self.video_packets, "video")] {
            if let Some(queue) = queue {
                let dropped = queue.clear();
                if dropped > 0 {
                    info!("{} 🧹 清空 {} 包队列: {} 个", log_ctx(), name, dropped);
                }
            }
        }
        info!("{} ✅ 播放流水线已停止", log_ctx());
    }
}

fn join(handle: Option<JoinHandle<()>>, name: &str) {
    if let Some(handle) = handle {
        if handle.join().is_err() {
            error!("{} ❌ {} 线程异常退出", log_ctx(), name);
        }
    }
}

impl<P> Drop for Pipeline<P> {
    fn drop(&mut self) {
        if self.read_thread.is_some() || self.sync_thread.is_some() {
            warn!("{} ⚠ Pipeline 被 drop，但可能未调用 stop()，正在尝试优雅停止", log_ctx());
        }
        self.stop();
    }
}
