use anyhow::{Context, Result};
use crossbeam_channel::RecvTimeoutError;
use log::{info, warn};
use myy_core::core::PlayerConfig;
use myy_core::player::{PlaybackEvent, Player};
use std::time::Duration;

fn main() -> Result<()> {
    // 初始化日志
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .context("用法: myy_core <媒体文件> [配置文件.json]")?;
    let config = match args.next() {
        Some(config_path) => PlayerConfig::from_json_file(&config_path)
            .with_context(|| format!("读取配置失败: {}", config_path))?,
        None => PlayerConfig::default(),
    };

    // 初始化 FFmpeg
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("FFmpeg 初始化失败: {}", e))?;
    info!("✅ FFmpeg 初始化成功");

    let mut player = Player::open(&path, &config)?;
    println!("{}", serde_json::to_string_pretty(player.media_info())?);

    loop {
        match player.events().recv_timeout(Duration::from_secs(1)) {
            Ok(PlaybackEvent::DataReady) => info!("▶ 开始播放"),
            Ok(PlaybackEvent::Finished { read_failed }) => {
                if read_failed {
                    warn!("⚠ 读包出错，播放提前结束");
                }
                info!("✅ 播放完成");
                break;
            }
            Ok(PlaybackEvent::Stopped) => break,
            Err(RecvTimeoutError::Timeout) => {
                let status = player.buffer_status();
                info!(
                    "📊 缓冲: 视频包 {} / 音频包 {} / 视频帧 {} ({} 字节) / 音频帧 {} ({} 字节)",
                    status.video_packets,
                    status.audio_packets,
                    status.video_frames,
                    status.video_frame_bytes,
                    status.audio_frames,
                    status.audio_frame_bytes
                );
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    player.stop();
    Ok(())
}
