use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Set up tracing. Writes to `<log dir>/<file_name>` when logging is enabled
/// and the directory can be created, otherwise to stderr. `RUST_LOG`
/// overrides the configured level.
pub fn init_tracing(config: &LoggingConfig, file_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let dir = config
        .log_directory()
        .filter(|_| config.enabled)
        .filter(|d| fs::create_dir_all(d).is_ok());

    match dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let subscriber = tracing_subscriber::fmt()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_env_filter(filter)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_env_filter(filter)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    }
}

/// Plain-text transcript of one capture session: what was captured, the
/// description, then every question and answer. Writing is best effort.
pub struct SessionLog {
    directory: Option<PathBuf>,
    current: Mutex<Option<PathBuf>>,
}

impl SessionLog {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            directory: config.log_directory().filter(|_| config.enabled),
            current: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self {
            directory: None,
            current: Mutex::new(None),
        }
    }

    pub fn in_directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(dir.into()),
            current: Mutex::new(None),
        }
    }

    /// Path of the transcript for the current capture, if one was opened.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current.lock().clone()
    }

    /// Open a fresh transcript for a new capture.
    pub fn start(&self, media: &str, location: &str) {
        let path = self.directory.as_deref().and_then(|dir| create_transcript(dir, media, location));
        *self.current.lock() = path;
    }

    pub fn log_description(&self, description: &str) {
        let now = Local::now().format("%H:%M:%S");
        self.append(&format!("[{now}] Analysis:\n{description}\n\n"));
    }

    /// Append a question/answer pair. Call after each chat response.
    pub fn log_exchange(&self, question: &str, answer: &str) {
        let now = Local::now().format("%H:%M:%S");
        self.append(&format!("[{now}] You:\n{question}\n\n[{now}] Unveil:\n{answer}\n\n"));
    }

    fn append(&self, entry: &str) {
        let Some(path) = self.current_path() else { return };
        let mut file = match OpenOptions::new().append(true).open(&path) {
            Ok(f) => f,
            Err(_) => return,
        };
        let _ = file.write_all(entry.as_bytes());
    }
}

fn create_transcript(dir: &Path, media: &str, location: &str) -> Option<PathBuf> {
    fs::create_dir_all(dir).ok()?;

    let slug = media
        .replace(' ', "-")
        .replace(|c: char| !c.is_alphanumeric() && c != '-', "");
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S-%3f");
    let path = dir.join(format!("{slug}_{timestamp}.txt"));

    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&path)
        .ok()?;

    let header = format!(
        "=== Unveil - Session Log ===\nMedia: {media}\nLocation: {location}\nDate: {}\n============================\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    file.write_all(header.as_bytes()).ok()?;

    Some(path)
}
