use anyhow::{Context, ensure};
use cadence_config::CadenceConfig;
use cadence_fifo::{SharedFifo, Writer};
use cadence_frames::{Frame, StereoFrame, as_bytes};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 440 Hz at 48 kHz, rounded to whole frames.
const TONE_PERIOD: u32 = 109;
const TONE_AMPLITUDE: i16 = 8_000;

fn main() -> anyhow::Result<()> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => CadenceConfig::load(path).context("failed to load config")?,
        None => CadenceConfig::default(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level)),
        )
        .init();
    ensure!(
        cfg.frame_size == StereoFrame::SIZE,
        "tone-writer produces {}-byte frames, config asks for {}",
        StereoFrame::SIZE,
        cfg.frame_size
    );

    let mut shm = SharedFifo::create(
        &cfg.shm_file_path,
        cfg.frame_count,
        cfg.frame_size,
        cfg.throttle,
    )?;
    let fifo = shm.fifo()?.with_sync(cfg.sync_mode(), cfg.sync_mode());
    let mut writer = Writer::new(&fifo)?;
    if let Some(level) = cfg.low_arm {
        writer.set_low_arm_threshold(level)?;
    }
    if let Some(level) = cfg.high_trigger {
        writer.set_high_trigger_threshold(level)?;
    }
    if let Some(frames) = cfg.effective_frames {
        writer.set_effective_frame_count(frames)?;
    }

    info!(
        path = %cfg.shm_file_path,
        frame_count = cfg.frame_count,
        throttle = cfg.throttle,
        "tone-writer publishing"
    );

    let timeout = cfg.timeout();
    let mut chunk = vec![StereoFrame::default(); cfg.chunk_frames.max(1) as usize];
    let mut next_frame: u64 = 0;
    let mut pending = 0..0;

    let mut last = Instant::now();
    let mut written_since: u64 = 0;

    loop {
        if pending.is_empty() {
            for (i, frame) in chunk.iter_mut().enumerate() {
                *frame = StereoFrame::sine(next_frame + i as u64, TONE_PERIOD, TONE_AMPLITUDE);
            }
            next_frame += chunk.len() as u64;
            pending = 0..chunk.len();
        }

        let written = writer.write(as_bytes(&chunk[pending.clone()]), timeout)?;
        pending.start += written;
        written_since += written as u64;

        if last.elapsed() >= Duration::from_secs(1) {
            info!(
                frames_per_sec = written_since,
                wakes = writer.wakes(),
                total = writer.total_released(),
                "tone-writer rate"
            );
            written_since = 0;
            last = Instant::now();
        }

        if written == 0 && timeout.is_none() {
            std::hint::spin_loop();
        }
    }
}
