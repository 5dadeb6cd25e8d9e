use cadence_frames::StereoFrame;

// ─── Statistics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub count: usize,
}

pub fn compute_stats(samples: &mut [u64]) -> Stats {
    assert!(!samples.is_empty(), "cannot compute stats on empty samples");
    samples.sort_unstable();

    let count = samples.len();
    let sum: u128 = samples.iter().map(|&s| s as u128).sum();

    Stats {
        min: samples[0],
        max: samples[count - 1],
        mean: sum as f64 / count as f64,
        p50: percentile_sorted(samples, 50.0),
        p90: percentile_sorted(samples, 90.0),
        p99: percentile_sorted(samples, 99.0),
        p999: percentile_sorted(samples, 99.9),
        count,
    }
}

fn percentile_sorted(sorted: &[u64], pct: f64) -> u64 {
    let len = sorted.len();
    if len == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0 * len as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(len - 1);
    sorted[idx]
}

// ─── Fixtures ───────────────────────────────────────────────────────────────

pub fn temp_shm_path(label: &str) -> String {
    let pid = std::process::id();
    format!("/tmp/cadence_bench_{label}_{pid}")
}

/// `frames` frames of a test tone.
pub fn tone_chunk(frames: usize) -> Vec<StereoFrame> {
    (0..frames as u64)
        .map(|n| StereoFrame::sine(n, 64, 12_000))
        .collect()
}
