//! Cross-thread hand-off latency through a throttled FIFO.
//!
//! The writer stamps each frame with a monotonic timestamp; a blocking reader
//! records how long each frame took to become readable. Prints JSON stats.

use cadence_fifo::{Fifo, Reader, Writer};
use cadence_perf::compute_stats;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

const FRAMES: usize = 200_000;
const FRAME_COUNT: u32 = 1024;
const FRAME_SIZE: u32 = 8;

fn now_ns() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

fn main() {
    let mut buffer = vec![0u8; (FRAME_COUNT * FRAME_SIZE) as usize];
    let fifo = Fifo::new(FRAME_COUNT, FRAME_SIZE, &mut buffer, true).expect("valid fifo");
    let timeout = Some(Duration::from_millis(100));

    let samples = std::thread::scope(|s| {
        s.spawn(|| {
            let mut writer = Writer::new(&fifo).expect("writer");
            let mut sent = 0;
            while sent < FRAMES {
                let stamp = now_ns().to_ne_bytes();
                sent += writer.write(&stamp, timeout).expect("write");
            }
        });

        let reader = s.spawn(|| {
            let mut reader = Reader::new(&fifo, true).expect("reader");
            let mut samples = Vec::with_capacity(FRAMES);
            let mut frame = [0u8; FRAME_SIZE as usize];
            while samples.len() < FRAMES {
                let outcome = reader.read(&mut frame, timeout).expect("read");
                if outcome.frames == 1 {
                    samples.push(now_ns().saturating_sub(u64::from_ne_bytes(frame)));
                }
            }
            samples
        });
        reader.join().expect("reader thread")
    });

    let mut samples = samples;
    let stats = compute_stats(&mut samples);
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).expect("stats serialize")
    );
}
