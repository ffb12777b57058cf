//! RotatingFileSink - NDJSON file with size-based rotation
//!
//! Backups are numbered `path.1` (newest) to `path.N` (oldest). Rotation
//! shifts every backup up by one, drops the one that would exceed N, and
//! renames the current file to `path.1`.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use contracts::{Context, Event, Sink, SinkError};
use observability::metrics::record_file_rotation;
use tracing::{debug, error, info, instrument, warn};

/// Default size limit (10 MiB)
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Default number of numbered backups
pub const DEFAULT_MAX_BACKUPS: usize = 3;

/// Configuration for RotatingFileSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatingFileConfig {
    /// Current file path
    pub path: PathBuf,
    /// Size that triggers rotation; 0 means the default
    pub max_bytes: u64,
    /// Numbered backups kept; 0 discards the file on rotation
    pub max_backups: usize,
}

impl RotatingFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }

    /// Create config from params map
    ///
    /// `path` is required; `max_bytes` and `max_backups` are optional.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| "missing required param 'path'".to_string())?;

        let max_bytes = match params.get("max_bytes") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid max_bytes '{raw}': {e}"))?,
            None => DEFAULT_MAX_BYTES,
        };
        let max_backups = match params.get("max_backups") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("invalid max_backups '{raw}': {e}"))?,
            None => DEFAULT_MAX_BACKUPS,
        };

        Ok(Self {
            path,
            max_bytes,
            max_backups,
        })
    }
}

/// Append-only writer split across numbered files
#[derive(Debug)]
pub struct RotatingWriter {
    path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    file: Option<File>,
    size: u64,
}

impl RotatingWriter {
    /// Open (or create) the current file, appending to existing content.
    pub fn open(config: &RotatingFileConfig) -> io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = open_append(&config.path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: config.path.clone(),
            max_bytes: if config.max_bytes == 0 {
                DEFAULT_MAX_BYTES
            } else {
                config.max_bytes
            },
            max_backups: config.max_backups,
            file: Some(file),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes in the current file
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append `buf`, rotating first if it would push the file past the limit.
    ///
    /// Returns whether a rotation happened. A failed rotation is logged and
    /// the write goes to the current file.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<bool> {
        let mut rotated = false;
        if self.size > 0 && self.size + buf.len() as u64 > self.max_bytes {
            match self.rotate() {
                Ok(()) => rotated = true,
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Rotation failed, writing to current file"
                ),
            }
        }

        let file = self.file.as_mut().ok_or_else(closed_error)?;
        file.write_all(buf)?;
        self.size += buf.len() as u64;
        Ok(rotated)
    }

    /// Close the current file, shift backups, and start a fresh file.
    ///
    /// On failure the current path is reopened for appending.
    #[instrument(name = "rotating_writer_rotate", skip(self), fields(path = %self.path.display()))]
    pub fn rotate(&mut self) -> io::Result<()> {
        drop(self.file.take());

        if let Err(e) = self.shift_backups() {
            self.reopen_current();
            return Err(e);
        }

        match open_append(&self.path) {
            Ok(file) => {
                self.file = Some(file);
                self.size = 0;
                Ok(())
            }
            Err(e) => {
                self.reopen_current();
                Err(e)
            }
        }
    }

    fn shift_backups(&self) -> io::Result<()> {
        if self.max_backups == 0 {
            return remove_if_exists(&self.path);
        }

        remove_if_exists(&self.backup_path(self.max_backups))?;
        for index in (1..self.max_backups).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))
    }

    fn reopen_current(&mut self) {
        match open_append(&self.path).and_then(|f| Ok((f.metadata()?.len(), f))) {
            Ok((size, file)) => {
                self.size = size;
                self.file = Some(file);
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to reopen log file");
            }
        }
    }

    /// `path.<index>`
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => {
                file.flush()?;
                file.sync_data()
            }
            None => Ok(()),
        }
    }

    /// Release the handle; later writes fail
    pub fn close(&mut self) -> io::Result<()> {
        let result = self.flush();
        self.file = None;
        result
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn closed_error() -> io::Error {
    io::Error::other("file is closed")
}

/// Sink that writes one JSON object per line to a rotating file.
///
/// Construction never fails: if the file cannot be opened the sink keeps
/// the error and rejects every event with [`SinkError::Unavailable`].
///
/// Appends and rotations run inline on the calling task while the writer
/// lock is held. `flush` (fsync) and `close` run on the blocking pool.
///
/// ```
/// use std::time::Duration;
///
/// use adapters::{BreakerConfig, SinkExt};
/// use contracts::SharedSink;
/// use dispatcher::{Logger, RotatingFileConfig, RotatingFileSink};
///
/// let path = std::env::temp_dir().join("sigroute-doc").join("audit.log");
/// let sink: SharedSink = RotatingFileSink::new("audit", RotatingFileConfig::new(path))
///     .with_backoff(4, Duration::from_millis(50))
///     .with_circuit_breaker(BreakerConfig::default())
///     .with_async()
///     .shared();
///
/// let logger = Logger::new();
/// logger.register("ORDER_PLACED", sink);
/// assert_eq!(logger.sink_names("ORDER_PLACED"), ["audit"]);
/// ```
pub struct RotatingFileSink {
    name: String,
    writer: Result<Arc<Mutex<RotatingWriter>>, String>,
    rotations: AtomicU64,
}

impl RotatingFileSink {
    pub fn new(name: impl Into<String>, config: RotatingFileConfig) -> Self {
        let name = name.into();
        let writer = match RotatingWriter::open(&config) {
            Ok(writer) => Ok(Arc::new(Mutex::new(writer))),
            Err(e) => {
                error!(
                    sink = %name,
                    path = %config.path.display(),
                    error = %e,
                    "Failed to open log file, sink will reject all events"
                );
                Err(e.to_string())
            }
        };
        Self {
            name,
            writer,
            rotations: AtomicU64::new(0),
        }
    }

    /// Like [`new`](Self::new) but returns the open error
    pub fn try_new(name: impl Into<String>, config: RotatingFileConfig) -> io::Result<Self> {
        let writer = RotatingWriter::open(&config)?;
        Ok(Self {
            name: name.into(),
            writer: Ok(Arc::new(Mutex::new(writer))),
            rotations: AtomicU64::new(0),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, String> {
        let config = RotatingFileConfig::from_params(params)?;
        Ok(Self::new(name, config))
    }

    /// Whether the file was opened successfully
    pub fn is_available(&self) -> bool {
        self.writer.is_ok()
    }

    /// Rotations performed by this sink
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    fn writer(&self) -> Result<&Arc<Mutex<RotatingWriter>>, SinkError> {
        self.writer
            .as_ref()
            .map_err(|message| SinkError::unavailable(&self.name, message.clone()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, RotatingWriter>, SinkError> {
        Ok(self.writer()?.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run `op` on the writer from the blocking pool
    async fn blocking<F>(&self, op: F) -> Result<(), SinkError>
    where
        F: FnOnce(&mut RotatingWriter) -> io::Result<()> + Send + 'static,
    {
        let writer = Arc::clone(self.writer()?);
        tokio::task::spawn_blocking(move || {
            let mut guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut guard)
        })
        .await
        .map_err(|e| SinkError::handler(&self.name, format!("writer task failed: {e}")))?
        .map_err(SinkError::from)
    }

    fn write_line(&self, line: &[u8]) -> Result<(), SinkError> {
        let mut writer = self.lock()?;
        let rotated = writer.write(line).map_err(|e| {
            error!(sink = %self.name, error = %e, "Write failed");
            SinkError::handler(&self.name, format!("write failed: {e}"))
        })?;
        drop(writer);

        if rotated {
            let total = self.rotations.fetch_add(1, Ordering::Relaxed) + 1;
            record_file_rotation(&self.name);
            info!(sink = %self.name, rotations = total, "Log file rotated");
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for RotatingFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _ctx: &Context, event: Event) -> Result<Event, SinkError> {
        let mut line =
            serde_json::to_vec(&event).map_err(|e| SinkError::encode(&self.name, e.to_string()))?;
        line.push(b'\n');
        self.write_line(&line)?;
        Ok(event)
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.blocking(RotatingWriter::flush).await
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.blocking(RotatingWriter::close).await?;
        debug!(sink = %self.name, "RotatingFileSink closed");
        Ok(())
    }
}
