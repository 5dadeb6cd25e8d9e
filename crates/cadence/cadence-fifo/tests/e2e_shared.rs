//! End-to-end test of a FIFO shared between processes.
//!
//! The test binary spawns itself three times. An environment variable selects
//! the role of each child:
//!
//! ```text
//! [parent]    create file ---- spawn reader, observer ---- spawn writer ---- wait
//! [reader]         open, throttle the writer, read every frame in order
//! [observer]       open, follow the rear, count frames read and lost
//! [writer]                                  open, write FRAME_COUNT frames
//! ```
//!
//! The reader throttles the writer, so it must see every frame exactly once.
//! The observer does not, so it may fall behind; every frame must still be
//! either read by it or reported lost.
//!
//! ```bash
//! cargo test -p cadence-fifo --test e2e_shared -- --nocapture
//! ```

use cadence_fifo::{FifoError, Reader, SharedFifo, Writer};
use cadence_frames::{Frame, StereoFrame, as_bytes, as_bytes_mut};
use std::env;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Writes to stderr and flushes, so output survives test capture.
macro_rules! log {
    ($($arg:tt)*) => {{
        let _ = writeln!(std::io::stderr(), $($arg)*);
        let _ = std::io::stderr().flush();
    }};
}

const ENV_ROLE: &str = "CADENCE_E2E_ROLE";
const ENV_PATH: &str = "CADENCE_E2E_PATH";

const ROLE_WRITER: &str = "writer";
const ROLE_READER: &str = "reader";
const ROLE_OBSERVER: &str = "observer";

const TEST_NAME: &str = "e2e_two_process_shared_fifo";

/// Frames sent by the writer.
const FRAME_COUNT: u32 = 500_000;

/// Deliberately not a power of two.
const FIFO_FRAMES: u32 = 1000;

const CHUNK: usize = 64;
const TIMEOUT: Option<Duration> = Some(Duration::from_millis(10));
const DEADLINE: Duration = Duration::from_secs(30);
const IDLE_AFTER_WRITER: Duration = Duration::from_secs(2);

fn test_path() -> String {
    let pid = std::process::id();
    format!("/tmp/cadence_e2e_fifo_{pid}")
}

/// Frame carrying sequence number `n`.
fn sequence_frame(n: u32) -> StereoFrame {
    StereoFrame::new(n as u16 as i16, (n >> 16) as u16 as i16)
}

fn sequence_of(frame: &StereoFrame) -> u32 {
    frame.left as u16 as u32 | (frame.right as u16 as u32) << 16
}

fn run_writer(path: &str) {
    let mut shm = SharedFifo::open(path).expect("writer: open");
    let fifo = shm.fifo().expect("writer: fifo");
    let mut writer = Writer::new(&fifo).expect("writer: attach");
    log!("[WRITER] attached, sending {FRAME_COUNT} frames");

    let deadline = Instant::now() + DEADLINE;
    let start = Instant::now();
    let mut chunk = [StereoFrame::default(); CHUNK];
    let mut next = 0u32;
    while next < FRAME_COUNT {
        assert!(Instant::now() < deadline, "writer stalled at frame {next}");
        let n = (FRAME_COUNT - next).min(CHUNK as u32) as usize;
        for (i, frame) in chunk[..n].iter_mut().enumerate() {
            *frame = sequence_frame(next + i as u32);
        }
        next += writer.write(as_bytes(&chunk[..n]), TIMEOUT).expect("writer: write") as u32;
    }

    let elapsed = start.elapsed();
    log!(
        "[WRITER] done in {elapsed:?} ({:.0} frames/s), {} wakes",
        FRAME_COUNT as f64 / elapsed.as_secs_f64(),
        writer.wakes()
    );
}

fn run_reader(path: &str) {
    let mut shm = SharedFifo::open(path).expect("reader: open");
    assert!(shm.is_throttled());
    let fifo = shm.fifo().expect("reader: fifo");
    let mut reader = Reader::new(&fifo, true).expect("reader: attach");
    log!("[READER] attached, throttling the writer");

    let deadline = Instant::now() + DEADLINE;
    let mut chunk = [StereoFrame::default(); CHUNK];
    let mut expected = 0u32;
    while expected < FRAME_COUNT {
        assert!(Instant::now() < deadline, "reader stalled at frame {expected}");
        let outcome = reader.read(as_bytes_mut(&mut chunk[..]), TIMEOUT).expect("reader: read");
        assert_eq!(outcome.lost, 0, "throttling reader lost frames");
        for frame in &chunk[..outcome.frames] {
            assert_eq!(sequence_of(frame), expected);
            expected += 1;
        }
    }
    log!("[READER] received all {FRAME_COUNT} frames in order");
}

fn run_observer(path: &str) {
    let mut shm = SharedFifo::open(path).expect("observer: open");
    let fifo = shm.fifo().expect("observer: fifo");
    let mut reader = Reader::new(&fifo, false).expect("observer: attach");
    log!("[OBSERVER] attached, following the rear");

    // Frames an observer copies may be overwritten while it copies them, so
    // only the accounting is checked here, not the contents.
    let deadline = Instant::now() + DEADLINE;
    let mut chunk = [StereoFrame::default(); CHUNK];
    let mut frames_seen = 0u64;
    let mut last_progress = Instant::now();
    while frames_seen == 0 || last_progress.elapsed() < IDLE_AFTER_WRITER {
        assert!(Instant::now() < deadline, "observer never went idle");
        match reader.read(as_bytes_mut(&mut chunk[..]), TIMEOUT) {
            Ok(outcome) if outcome.frames > 0 => {
                frames_seen += outcome.frames as u64;
                last_progress = Instant::now();
            }
            Ok(_) => {}
            // Lapped again during the retry; the skip is already counted.
            Err(FifoError::Overflow { .. }) => last_progress = Instant::now(),
            Err(err) => panic!("observer: read failed: {err}"),
        }
    }

    let lost = reader.total_lost();
    log!(
        "[OBSERVER] saw {frames_seen} frames, {lost} lost over {} overruns",
        reader.overruns()
    );
    assert_eq!(frames_seen + lost, FRAME_COUNT as u64, "frames unaccounted for");
}

fn spawn_role(role: &str, path: &str) -> Child {
    let exe = env::current_exe().expect("current exe");
    Command::new(exe)
        .arg("--exact")
        .arg(TEST_NAME)
        .arg("--nocapture")
        .env(ENV_ROLE, role)
        .env(ENV_PATH, path)
        .stderr(Stdio::inherit())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to spawn {role}: {e}"))
}

#[test]
fn e2e_two_process_shared_fifo() {
    if let Ok(role) = env::var(ENV_ROLE) {
        let path = env::var(ENV_PATH).expect("CADENCE_E2E_PATH not set");
        match role.as_str() {
            ROLE_WRITER => run_writer(&path),
            ROLE_READER => run_reader(&path),
            ROLE_OBSERVER => run_observer(&path),
            other => panic!("unknown role: {other}"),
        }
        return;
    }

    let path = test_path();
    let shm = SharedFifo::create(&path, FIFO_FRAMES, StereoFrame::SIZE, true)
        .expect("failed to create shared fifo");
    drop(shm);
    log!("[PARENT] fifo at {path}: {FIFO_FRAMES} frames of {} bytes", StereoFrame::SIZE);

    let mut reader = spawn_role(ROLE_READER, &path);
    let mut observer = spawn_role(ROLE_OBSERVER, &path);
    // Let both attach before any frame is written.
    std::thread::sleep(Duration::from_millis(200));
    let mut writer = spawn_role(ROLE_WRITER, &path);

    let writer_status = writer.wait().expect("wait for writer");
    let reader_status = reader.wait().expect("wait for reader");
    let observer_status = observer.wait().expect("wait for observer");
    let _ = std::fs::remove_file(&path);

    assert!(writer_status.success(), "writer failed: {writer_status}");
    assert!(reader_status.success(), "reader failed: {reader_status}");
    assert!(observer_status.success(), "observer failed: {observer_status}");
}
