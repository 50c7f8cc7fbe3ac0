mod common;

use common::*;
use myy_core::core::{BoundedQueue, DecodedAudioUnit, MediaKind, PlaybackControl, PopResult};
use myy_core::player::decode_worker::{self, FrameQueue};
use myy_core::player::StreamDecoder;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct Harness {
    packets: Arc<BoundedQueue<SyntheticPacket>>,
    frames: Arc<FrameQueue<DecodedAudioUnit>>,
    control: Arc<PlaybackControl>,
}

fn run_to_end(codec: LaggingCodec, pts: &[i64]) -> Harness {
    let packets = Arc::new(BoundedQueue::counted());
    let frames = Arc::new(BoundedQueue::sized());
    let control = Arc::new(PlaybackControl::new(true, false));
    for &p in pts {
        packets.push_unit(SyntheticPacket::audio(p, 16));
    }
    packets.push_end();

    let decoder = StreamDecoder::new(MediaKind::Audio, codec, ToAudioUnit, MICROS, 1 << 20);
    let handle = decode_worker::spawn(decoder, packets.clone(), frames.clone(), control.clone(), true).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !control.audio_decode_ended() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    control.request_abort();
    handle.join().unwrap();

    Harness { packets, frames, control }
}

fn decoded_pts(frames: &FrameQueue<DecodedAudioUnit>) -> Vec<i64> {
    let mut out = Vec::new();
    while let PopResult::Unit(unit) = frames.pop() {
        out.push(unit.pts);
    }
    out
}

#[test]
fn flush_releases_frames_held_by_decoder() {
    let h = run_to_end(LaggingCodec::new(MICROS, 2), &[0, 1, 2, 3, 4]);

    assert!(h.control.audio_decode_ended());
    assert!(h.packets.is_empty());
    assert_eq!(decoded_pts(&h.frames), vec![0, 1, 2, 3, 4]);
}

#[test]
fn receive_error_is_skipped_and_decoding_continues() {
    let codec = LaggingCodec::new(MICROS, 0).failing_on(2);
    let failures = codec.failures.clone();
    let h = run_to_end(codec, &[0, 1, 2, 3, 4]);

    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert!(h.control.audio_decode_ended());
    // 出错之后的包仍被送入解码器
    assert!(h.packets.is_empty());
    assert_eq!(decoded_pts(&h.frames), vec![0, 1, 3, 4]);
}
