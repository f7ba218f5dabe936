//! Background-drained logger, grounded on the original `Log` singleton
//! (a `BlockDeque<std::string>` drained by one writer thread, rolling the
//! file by date or after `MAX_LINES`) and on the teacher's `proxy_log`
//! macro surface (`info!`, `warn!`, ...). Unlike `proxy_log`, which wraps
//! a synchronous `println!`, this drains through this crate's own
//! `BlockingDeque` on a background thread, same as the original.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::blocking_deque::BlockingDeque;

const MAX_LINES: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[34m",
        }
    }
}

struct RollState {
    day: (i64, i64, i64),
    lines_today: usize,
    file: File,
}

pub struct AsyncLog {
    queue: Arc<BlockingDeque<String>>,
    level: Level,
    writer: Option<JoinHandle<()>>,
    dropped: AtomicUsize,
}

static LOGGER: OnceLock<AsyncLog> = OnceLock::new();

impl AsyncLog {
    /// Initialize the process-wide logger. A no-op if already initialized
    /// (mirrors the original `Log::Instance()->init(...)` call-once use).
    pub fn init(level: Level, dir: &str, queue_size: usize) {
        LOGGER.get_or_init(|| Self::start(level, dir, queue_size));
    }

    fn start(level: Level, dir: &str, queue_size: usize) -> Self {
        let dir = PathBuf::from(dir);
        let _ = fs::create_dir_all(&dir);
        let queue = Arc::new(BlockingDeque::new(queue_size.max(1)));

        let writer = {
            let queue = queue.clone();
            let dir = dir.clone();
            std::thread::spawn(move || Self::drain_loop(queue, dir))
        };

        Self {
            queue,
            level,
            writer: Some(writer),
            dropped: AtomicUsize::new(0),
        }
    }

    fn drain_loop(queue: Arc<BlockingDeque<String>>, dir: PathBuf) {
        let mut state: Option<RollState> = None;
        loop {
            let Some(line) = queue.pop() else { break };
            let today = civil_day(SystemTime::now());

            let needs_new_file = match &state {
                Some(s) => s.day != today || s.lines_today >= MAX_LINES,
                None => true,
            };

            if needs_new_file {
                if let Ok(file) = open_log_file(&dir, today, state.as_ref().map_or(0, |_| 1)) {
                    state = Some(RollState {
                        day: today,
                        lines_today: 0,
                        file,
                    });
                }
            }

            if let Some(s) = state.as_mut() {
                let _ = writeln!(s.file, "{line}");
                s.lines_today += 1;
            }
        }
    }

    fn log_line(&self, level: Level, message: String) {
        if level > self.level {
            return;
        }
        let ts = timestamp(SystemTime::now());
        let line = format!(
            "[{ts}] {}{}:\x1b[0m {message}",
            level.color(),
            level.tag()
        );
        if self.queue.push_back(line).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn log(level: Level, message: String) {
        if let Some(logger) = LOGGER.get() {
            logger.log_line(level, message);
        } else {
            eprintln!("{message}");
        }
    }

    pub fn flush_and_stop() {
        if let Some(logger) = LOGGER.get() {
            logger.queue.close();
        }
    }
}

impl Drop for AsyncLog {
    fn drop(&mut self) {
        self.queue.close();
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

fn open_log_file(dir: &std::path::Path, day: (i64, i64, i64), suffix: usize) -> std::io::Result<File> {
    let (y, m, d) = day;
    let name = if suffix == 0 {
        format!("{:04}_{:02}_{:02}.log", y, m, d)
    } else {
        format!("{:04}_{:02}_{:02}-{}.log", y, m, d, suffix)
    };
    OpenOptions::new().create(true).append(true).open(dir.join(name))
}

/// Approximate Gregorian civil date from a `SystemTime`, same rough math
/// the original's `formatTime` uses (no leap-second handling).
fn civil_day(t: SystemTime) -> (i64, i64, i64) {
    let secs = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs() as i64;
    let days = secs.div_euclid(86_400);
    // Howard Hinnant's days_from_civil inverse, a standard constant-time
    // civil-from-days algorithm.
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

fn timestamp(t: SystemTime) -> String {
    let secs = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs();
    let (y, mo, d) = civil_day(t);
    let sod = secs % 86_400;
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        y,
        mo,
        d,
        sod / 3600,
        (sod % 3600) / 60,
        sod % 60
    )
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log::AsyncLog::log($crate::log::Level::Error, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log::AsyncLog::log($crate::log::Level::Warn, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log::AsyncLog::log($crate::log::Level::Info, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log::AsyncLog::log($crate::log::Level::Debug, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log::AsyncLog::log($crate::log::Level::Trace, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_day_matches_known_date() {
        // 2024-03-05T00:00:00Z
        let t = UNIX_EPOCH + Duration::from_secs(1_709_596_800);
        assert_eq!(civil_day(t), (2024, 3, 5));
    }

    #[test]
    fn level_ordering_filters_below_threshold() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
    }
}
