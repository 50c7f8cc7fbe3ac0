mod common;

use common::*;
use crossbeam_channel::Receiver;
use myy_core::core::{
    AudioFormat, BoundedQueue, MediaKind, PlaybackControl, PlayerConfig, PopResult, PRELOAD_SECONDS,
    VideoFormat,
};
use myy_core::player::decode_worker;
use myy_core::player::{
    audio_cache_budget, PacedPull, Pipeline, PipelineBuilder, PlaybackEvent, StreamDecoder,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// 8000 Hz 单声道 S16：16000 字节/秒
fn pcm_format() -> AudioFormat {
    AudioFormat::s16(8000, 1)
}

fn pcm_bytes(ms: usize) -> usize {
    pcm_format().bytes_per_second() * ms / 1000
}

fn audio_decoder(budget: usize) -> StreamDecoder<FakeCodec, ToAudioUnit> {
    StreamDecoder::new(MediaKind::Audio, FakeCodec::new(MICROS), ToAudioUnit, MICROS, budget)
}

fn video_decoder(format: VideoFormat, budget: usize) -> StreamDecoder<FakeCodec, ToVideoUnit> {
    StreamDecoder::new(
        MediaKind::Video,
        FakeCodec::new(MICROS),
        ToVideoUnit { format },
        MICROS,
        budget,
    )
}

/// 等待播放结束事件（忽略 DataReady）
fn wait_finished(events: &Receiver<PlaybackEvent>, timeout: Duration) -> Option<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        let left = deadline.checked_duration_since(Instant::now())?;
        match events.recv_timeout(left) {
            Ok(PlaybackEvent::Finished { read_failed }) => return Some(read_failed),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

fn start_paced(pipeline: &mut Pipeline<SyntheticPacket>) -> PacedPull {
    let pull = pipeline.take_audio_pull().unwrap();
    assert!(pipeline.take_audio_pull().is_none());
    PacedPull::spawn(pull, pcm_format()).unwrap()
}

#[test]
fn audio_only_plays_to_completion() {
    let source = ScriptedSource::new(vec![
        SyntheticPacket::audio(0, pcm_bytes(100)),
        SyntheticPacket::audio(100_000, pcm_bytes(100)),
    ]);
    let mut pipeline = PipelineBuilder::new(source, PlayerConfig::default())
        .audio(AUDIO_STREAM, audio_decoder(audio_cache_budget(&pcm_format(), PRELOAD_SECONDS)))
        .start(Box::new(NullSink))
        .unwrap();
    let mut paced = start_paced(&mut pipeline);

    assert_eq!(wait_finished(pipeline.events(), Duration::from_secs(5)), Some(false));

    let control = pipeline.control().clone();
    assert!(control.read_ended());
    assert!(control.audio_decode_ended());
    assert!(control.audio_playback_ended());
    assert!(control.video_playback_ended());
    assert!(control.playback_ended());
    assert!(pipeline.is_finished());
    assert_eq!(pipeline.clocks().audio(), 100_000);

    paced.stop();
    pipeline.stop();
}

#[test]
fn video_follows_audio_clock() {
    let format = VideoFormat::yuv420p(2, 2);
    let source = ScriptedSource::new(vec![
        SyntheticPacket::audio(0, pcm_bytes(40)),
        SyntheticPacket::video(0, format.frame_size()),
        SyntheticPacket::audio(40_000, pcm_bytes(40)),
        SyntheticPacket::video(33_000, format.frame_size()),
        SyntheticPacket::audio(80_000, pcm_bytes(40)),
        SyntheticPacket::video(66_000, format.frame_size()),
    ]);

    let builder = PipelineBuilder::new(source, PlayerConfig::default())
        .audio(AUDIO_STREAM, audio_decoder(audio_cache_budget(&pcm_format(), PRELOAD_SECONDS)))
        .video(VIDEO_STREAM, format, video_decoder(format, format.frame_size() * 30));
    let sink = RecordingSink::new(builder.clocks(), MICROS);
    let log = sink.log.clone();
    let mut pipeline = builder.start(Box::new(sink)).unwrap();
    let mut paced = start_paced(&mut pipeline);

    assert_eq!(wait_finished(pipeline.events(), Duration::from_secs(5)), Some(false));
    paced.stop();
    pipeline.stop();

    let presented = log.lock().clone();
    let video: Vec<i64> = presented.iter().map(|p| p.video_us).collect();
    assert_eq!(video, vec![0, 33_000, 66_000]);
    for p in presented.iter().skip(2) {
        let gap = (p.video_us - p.audio_us).abs() as f64 / 1_000_000.0;
        assert!(gap < 0.1, "音视频偏差过大: {:?}", p);
    }
}

#[test]
fn video_only_uses_wall_clock() {
    let format = VideoFormat::yuv420p(2, 2);
    let source = ScriptedSource::new(
        [0, 40_000, 80_000]
            .into_iter()
            .map(|pts| SyntheticPacket::video(pts, format.frame_size()))
            .collect(),
    );
    let started = Instant::now();
    let mut pipeline = PipelineBuilder::new(source, PlayerConfig::default())
        .video(VIDEO_STREAM, format, video_decoder(format, format.frame_size() * 30))
        .start(Box::new(NullSink))
        .unwrap();
    assert!(pipeline.take_audio_pull().is_none());

    assert_eq!(wait_finished(pipeline.events(), Duration::from_secs(5)), Some(false));
    // 三帧按 40ms 间隔播放
    assert!(started.elapsed() >= Duration::from_millis(70));
    assert!(pipeline.control().audio_playback_ended());
    pipeline.stop();
}

#[test]
fn decoder_pauses_while_frame_cache_is_full() {
    let budget = audio_cache_budget(&AudioFormat::s16(48_000, 2), PRELOAD_SECONDS);
    assert_eq!(budget, 192_000);

    let packets = Arc::new(BoundedQueue::counted());
    let frames = Arc::new(BoundedQueue::sized());
    let control = Arc::new(PlaybackControl::new(true, false));
    for i in 0..6 {
        packets.push_unit(SyntheticPacket::audio(i * 1000, 50_000));
    }
    packets.push_end();

    let decoder = audio_decoder(budget);
    let receive_calls = decoder.codec.receive_calls.clone();
    let handle = decode_worker::spawn(decoder, packets.clone(), frames.clone(), control.clone(), true).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while frames.current_byte_total() < budget && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(20));

    // 4 × 50000 = 200000 ≥ 192000：不再向解码器取帧
    assert_eq!(frames.current_byte_total(), 200_000);
    assert_eq!(frames.len(), 4);
    let calls = receive_calls.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(receive_calls.load(Ordering::SeqCst), calls);
    assert!(!control.audio_decode_ended());

    // 取走一帧后低于上限，解码恢复
    assert!(matches!(frames.pop(), PopResult::Unit(_)));
    let deadline = Instant::now() + Duration::from_secs(5);
    while receive_calls.load(Ordering::SeqCst) == calls && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(receive_calls.load(Ordering::SeqCst) > calls);

    control.request_abort();
    handle.join().unwrap();
    assert!(control.audio_decode_ended());
}

#[test]
fn stop_joins_all_threads_on_abort() {
    let format = VideoFormat::yuv420p(2, 2);
    let mut pipeline = PipelineBuilder::new(EndlessSource::new(), PlayerConfig::default())
        .audio(AUDIO_STREAM, audio_decoder(pcm_bytes(200)))
        .video(VIDEO_STREAM, format, video_decoder(format, format.frame_size() * 30))
        .start(Box::new(NullSink))
        .unwrap();
    let events = pipeline.events().clone();
    let control = pipeline.control().clone();

    thread::sleep(Duration::from_millis(100));

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        pipeline.stop();
        let status = pipeline.buffer_status();
        let _ = done_tx.send(status);
    });

    let status = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("stop() 未能在超时前返回");
    assert!(control.abort_requested());
    assert!(control.read_ended());
    assert!(control.audio_decode_ended());
    assert!(control.video_decode_ended());
    assert_eq!(status.audio_packets, 0);
    assert_eq!(status.video_packets, 0);

    let got_stopped = events.try_iter().any(|e| e == PlaybackEvent::Stopped);
    assert!(got_stopped);
}

#[test]
fn read_error_drains_and_reports_failure() {
    let source = ScriptedSource::failing_after(vec![
        SyntheticPacket::audio(0, pcm_bytes(20)),
        SyntheticPacket::audio(20_000, pcm_bytes(20)),
    ]);
    let mut pipeline = PipelineBuilder::new(source, PlayerConfig::default())
        .audio(AUDIO_STREAM, audio_decoder(audio_cache_budget(&pcm_format(), PRELOAD_SECONDS)))
        .start(Box::new(NullSink))
        .unwrap();
    let mut paced = start_paced(&mut pipeline);

    assert_eq!(wait_finished(pipeline.events(), Duration::from_secs(5)), Some(true));
    assert!(pipeline.control().read_failed());
    // 出错前读到的数据全部播放
    assert_eq!(pipeline.clocks().audio(), 20_000);

    paced.stop();
    pipeline.stop();
}

#[test]
fn start_without_streams_is_rejected() {
    let result = PipelineBuilder::new(ScriptedSource::new(Vec::new()), PlayerConfig::default())
        .start(Box::new(NullSink));
    assert!(matches!(result, Err(myy_core::core::PlayerError::NoPlayableStream)));
}
