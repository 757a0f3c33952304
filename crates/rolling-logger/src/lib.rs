//! Rolling File Logger
//!
//! Writes formatted `tracing` events, and `log` records through the
//! `tracing-log` bridge, to `<dir>/<app>.log`. Once the active file passes
//! the size limit it is rotated to `<app>.log.1`, older files shift up, and
//! anything beyond `max_files` is removed.
//!
//! The most recent lines are also kept in a circular buffer so a front end
//! can show them without touching the file.

use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;

/// Logger tuning
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    /// Size at which the active file is rotated
    pub max_file_bytes: u64,
    /// Rotated files kept next to the active one
    pub max_files: usize,
    /// Lines kept in memory
    pub ring_capacity: usize,
    pub level: log::LevelFilter,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_files: 3,
            ring_capacity: 500,
            level: log::LevelFilter::Info,
        }
    }
}

// ========================
// Rolling file
// ========================

struct RollingFile {
    dir: PathBuf,
    app_name: String,
    max_bytes: u64,
    max_files: usize,
    file: Option<File>,
    written: u64,
}

impl RollingFile {
    fn open(dir: &Path, app_name: &str, max_bytes: u64, max_files: usize) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut rolling = Self {
            dir: dir.to_path_buf(),
            app_name: app_name.to_string(),
            max_bytes,
            max_files,
            file: None,
            written: 0,
        };
        rolling.open_active()?;
        Ok(rolling)
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.app_name))
    }

    fn rotated_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.app_name, n))
    }

    fn open_active(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.active_path())?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        if self.max_files == 0 {
            remove_if_exists(&self.active_path())?;
        } else {
            remove_if_exists(&self.rotated_path(self.max_files))?;
            for n in (1..self.max_files).rev() {
                let from = self.rotated_path(n);
                if from.exists() {
                    fs::rename(&from, self.rotated_path(n + 1))?;
                }
            }
            fs::rename(self.active_path(), self.rotated_path(1))?;
        }
        self.open_active()
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        if self.file.is_none() {
            self.open_active()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
            self.written += buf.len() as u64;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

// ========================
// Circular buffer
// ========================

struct RingBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

// ========================
// Writer
// ========================

struct Shared {
    file: Mutex<RollingFile>,
    ring: Mutex<RingBuffer>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
struct LogWriter {
    shared: Arc<Shared>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        {
            let mut ring = lock(&self.shared.ring);
            for line in String::from_utf8_lossy(buf).lines() {
                if !line.trim().is_empty() {
                    ring.push(line.to_string());
                }
            }
        }
        lock(&self.shared.file).write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.shared.file).flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Local wall-clock timestamps
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

fn to_tracing_level(level: log::LevelFilter) -> LevelFilter {
    match level {
        log::LevelFilter::Off => LevelFilter::OFF,
        log::LevelFilter::Error => LevelFilter::ERROR,
        log::LevelFilter::Warn => LevelFilter::WARN,
        log::LevelFilter::Info => LevelFilter::INFO,
        log::LevelFilter::Debug => LevelFilter::DEBUG,
        log::LevelFilter::Trace => LevelFilter::TRACE,
    }
}

// ========================
// Public API
// ========================

static LOGGER: OnceLock<Arc<Shared>> = OnceLock::new();

/// Initialize the global logger with default options
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), String> {
    init_logger_with(log_dir, app_name, LoggerOptions::default())
}

/// Initialize the global logger. Fails if a logger is already installed.
pub fn init_logger_with(
    log_dir: impl AsRef<Path>,
    app_name: &str,
    options: LoggerOptions,
) -> Result<(), String> {
    if LOGGER.get().is_some() {
        return Err("logger already initialized".to_string());
    }

    let file = RollingFile::open(
        log_dir.as_ref(),
        app_name,
        options.max_file_bytes,
        options.max_files,
    )
    .map_err(|e| format!("failed to open log file in {}: {}", log_dir.as_ref().display(), e))?;
    let shared = Arc::new(Shared {
        file: Mutex::new(file),
        ring: Mutex::new(RingBuffer::new(options.ring_capacity)),
    });

    tracing_subscriber::fmt()
        .with_writer(LogWriter {
            shared: Arc::clone(&shared),
        })
        .with_ansi(false)
        .with_timer(LocalTime)
        .with_max_level(to_tracing_level(options.level))
        .try_init()
        .map_err(|e| e.to_string())?;

    LOGGER
        .set(shared)
        .map_err(|_| "logger already initialized".to_string())?;
    tracing::info!("{} logger started in {}", app_name, log_dir.as_ref().display());
    Ok(())
}

fn ensure_init() -> Result<(), String> {
    LOGGER
        .get()
        .map(|_| ())
        .ok_or_else(|| "logger not initialized".to_string())
}

pub fn info(message: &str) -> Result<(), String> {
    ensure_init()?;
    tracing::info!("{}", message);
    Ok(())
}

pub fn warn(message: &str) -> Result<(), String> {
    ensure_init()?;
    tracing::warn!("{}", message);
    Ok(())
}

pub fn error(message: &str) -> Result<(), String> {
    ensure_init()?;
    tracing::error!("{}", message);
    Ok(())
}

/// Most recent lines, oldest first
pub fn recent_lines() -> Vec<String> {
    LOGGER
        .get()
        .map(|shared| lock(&shared.ring).lines.iter().cloned().collect())
        .unwrap_or_default()
}

/// Path of the active log file
pub fn log_file_path() -> Option<PathBuf> {
    LOGGER.get().map(|shared| lock(&shared.file).active_path())
}
