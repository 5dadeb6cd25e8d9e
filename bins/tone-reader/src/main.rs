use anyhow::Context;
use cadence_config::CadenceConfig;
use cadence_fifo::{FifoError, Reader, SharedFifo};
use cadence_frames::{StereoFrame, as_bytes_mut};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn open_with_retry(path: &str, patience: Duration) -> anyhow::Result<SharedFifo> {
    let deadline = Instant::now() + patience;
    loop {
        match SharedFifo::open(path) {
            Ok(shm) => return Ok(shm),
            Err(_) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(10)),
            Err(e) => return Err(e).with_context(|| format!("failed to open fifo at {path}")),
        }
    }
}

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

    let mut shm = open_with_retry(&cfg.shm_file_path, Duration::from_secs(5))?;
    let throttle = cfg.throttle && shm.is_throttled();
    let fifo = shm.fifo()?.with_sync(cfg.sync_mode(), cfg.sync_mode());
    let mut reader = Reader::new(&fifo, throttle)?;

    info!(path = %cfg.shm_file_path, throttle, "tone-reader attached");

    let timeout = cfg.timeout();
    let mut chunk = vec![StereoFrame::default(); cfg.chunk_frames.max(1) as usize];
    let mut peak: i16 = 0;

    let mut last = Instant::now();
    let mut read_since: u64 = 0;

    loop {
        let outcome = match reader.read(as_bytes_mut(&mut chunk[..]), timeout) {
            Ok(outcome) => outcome,
            Err(FifoError::Overflow { lost }) => {
                warn!(lost, "tone-reader lapped twice, resynchronized");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        if outcome.lost > 0 {
            warn!(lost = outcome.lost, "tone-reader fell behind");
        }
        for frame in &chunk[..outcome.frames] {
            peak = peak.max(frame.left.saturating_abs());
        }
        read_since += outcome.frames as u64;

        if last.elapsed() >= Duration::from_secs(1) {
            info!(
                frames_per_sec = read_since,
                peak,
                total_lost = reader.total_lost(),
                overruns = reader.overruns(),
                "tone-reader rate"
            );
            read_since = 0;
            peak = 0;
            last = Instant::now();
        }
    }
}
