use crate::core::{BoundedQueue, PlaybackControl, PlayerError, Result};
use crate::player::engine::{MediaPacket, PacketSource};
use crate::player::log_ctx;
use log::{debug, error, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// 数据包队列
pub type PacketQueue<P> = BoundedQueue<P>;

/// 一路流的路由：流索引 → 数据包队列
pub struct PacketRoute<P> {
    pub stream_index: usize,
    pub queue: Arc<PacketQueue<P>>,
}

impl<P> Clone for PacketRoute<P> {
    fn clone(&self) -> Self {
        Self {
            stream_index: self.stream_index,
            queue: self.queue.clone(),
        }
    }
}

/// 读包线程的路由表
pub struct ReadRoutes<P> {
    pub audio: Option<PacketRoute<P>>,
    pub video: Option<PacketRoute<P>>,
}

impl<P> ReadRoutes<P> {
    fn active(&self) -> impl Iterator<Item = &PacketRoute<P>> {
        self.audio.iter().chain(self.video.iter())
    }
}

// 日志节流：前 N 个包和每 100 个包打印一次
const LOG_FIRST_N: usize = 5;

/// 启动读包线程
pub fn spawn<S>(
    mut source: S,
    routes: ReadRoutes<S::Packet>,
    control: Arc<PlaybackControl>,
) -> Result<JoinHandle<()>>
where
    S: PacketSource + 'static,
{
    thread::Builder::new()
        .name("read".to_string())
        .spawn(move || read_loop(&mut source, &routes, &control))
        .map_err(|e| PlayerError::ThreadError(format!("启动读包线程失败: {}", e)))
}

/// 读包循环：按流索引把包分发到音频/视频包队列
///
/// 读取出错视为流结束（不重试）。退出时为每路活动流压入一个
/// `EndOfStream` 哨兵，然后置位 read-stream-ended。
pub fn read_loop<S: PacketSource>(
    source: &mut S,
    routes: &ReadRoutes<S::Packet>,
    control: &PlaybackControl,
) {
    info!("{} 🎬 读包线程启动: {}", log_ctx(), source.description());

    let mut packet_count: usize = 0;
    let mut routed_count: usize = 0;

    while !control.abort_requested() {
        match source.read_packet() {
            Ok(Some(packet)) => {
                packet_count += 1;
                let stream_index = packet.stream_index();

                match routes.active().find(|route| route.queue_for(stream_index)) {
                    Some(route) => {
                        routed_count += 1;
                        if routed_count <= LOG_FIRST_N || routed_count % 100 == 0 {
                            debug!(
                                "{} 📦 读取包 #{} (流 {}, 队列 {})",
                                log_ctx(),
                                routed_count,
                                stream_index,
                                route.queue.len()
                            );
                        }
                        route.queue.push_unit(packet);
                    }
                    // 其他流的包直接释放
                    None => drop(packet),
                }
            }
            Ok(None) => {
                info!("{} 📄 文件读取完毕，共读取 {} 个包", log_ctx(), packet_count);
                break;
            }
            Err(e) => {
                error!("{} [function]:read_packet [reason]:{}", log_ctx(), e);
                control.set_read_failed();
                break;
            }
        }
    }

    for route in routes.active() {
        route.queue.push_end();
    }
    control.set_read_ended();

    info!(
        "{} 🛑 读包线程退出（共 {} 个包，分发 {} 个）",
        log_ctx(),
        packet_count,
        routed_count
    );
}

impl<P> PacketRoute<P> {
    fn queue_for(&self, stream_index: usize) -> bool {
        self.stream_index == stream_index
    }
}
