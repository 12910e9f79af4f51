//! Buffered, rotating CSV log writer
//!
//! [`LogWriter`] persists pre-formatted rows to an append-only CSV file,
//! buffering in memory and rotating to a fresh file once the active one
//! grows past the configured threshold. One writer owns one log stream;
//! all of its state lives behind a single internal mutex, so `write` and
//! `flush` may be called freely from any thread.
//!
//! Rows that fail to reach disk are kept for the next flush instead of
//! being discarded, bounded by a hard ceiling that drops the oldest rows
//! first.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::WriterConfig;
use crate::error::WriterError;

/// Thread-safe buffered writer for one rotating CSV log stream.
pub struct LogWriter {
    config: WriterConfig,
    state: Mutex<WriterState>,
}

struct WriterState {
    buffer: VecDeque<String>,
    file: File,
    path: PathBuf,
    file_size: u64,
    records_written: u64,
    records_dropped: u64,
}

impl LogWriter {
    /// Create the log directory if needed and open a fresh file with its
    /// header row.
    ///
    /// # Errors
    ///
    /// Construction failures (directory uncreatable, file unopenable) are
    /// fatal to the writer and propagate.
    pub fn create(config: WriterConfig) -> Result<Self, WriterError> {
        fs::create_dir_all(&config.dir).map_err(|source| WriterError::CreateDirectory {
            path: config.dir.clone(),
            source,
        })?;

        let (file, path, file_size) = open_log_file(&config)?;
        debug!("{} log opened at {}", config.prefix, path.display());

        Ok(Self {
            config,
            state: Mutex::new(WriterState {
                buffer: VecDeque::new(),
                file,
                path,
                file_size,
                records_written: 0,
                records_dropped: 0,
            }),
        })
    }

    /// Append one pre-formatted row (without trailing newline) to the
    /// buffer; reaching capacity triggers a synchronous flush.
    pub fn write(&self, row: impl Into<String>) -> Result<(), WriterError> {
        let mut state = self.lock();
        state.buffer.push_back(row.into());
        if state.buffer.len() >= self.config.buffer_capacity {
            self.flush_locked(&mut state)
        } else {
            Ok(())
        }
    }

    /// Write any buffered rows to the active file, rotating first if the
    /// file has grown past the threshold.
    ///
    /// Safe to call concurrently with `write` and with itself; an empty
    /// buffer is a no-op.
    pub fn flush(&self) -> Result<(), WriterError> {
        let mut state = self.lock();
        self.flush_locked(&mut state)
    }

    fn flush_locked(&self, state: &mut WriterState) -> Result<(), WriterError> {
        if state.buffer.is_empty() {
            return Ok(());
        }

        // Rotation is checked before appending: an oversized file is never
        // appended past this point.
        if state.file_size > self.config.rotate_bytes {
            if let Err(err) = self.rotate_locked(state) {
                warn!("{} log rotation failed: {}", self.config.prefix, err);
                self.bound_retained(state);
                return Err(err);
            }
        }

        let mut chunk = String::new();
        for row in &state.buffer {
            chunk.push_str(row);
            chunk.push('\n');
        }

        match state.file.write_all(chunk.as_bytes()).and_then(|_| state.file.flush()) {
            Ok(()) => {
                state.file_size += chunk.len() as u64;
                state.records_written += state.buffer.len() as u64;
                state.buffer.clear();
                Ok(())
            }
            Err(source) => {
                let err = WriterError::Flush {
                    path: state.path.clone(),
                    source,
                };
                warn!(
                    "{} log flush failed, retaining {} buffered rows: {}",
                    self.config.prefix,
                    state.buffer.len(),
                    err
                );
                self.bound_retained(state);
                Err(err)
            }
        }
    }

    fn rotate_locked(&self, state: &mut WriterState) -> Result<(), WriterError> {
        let (file, path, file_size) = open_log_file(&self.config)?;
        debug!(
            "{} log rotated: {} -> {}",
            self.config.prefix,
            state.path.display(),
            path.display()
        );
        state.file = file;
        state.path = path;
        state.file_size = file_size;
        Ok(())
    }

    /// Drop the oldest retained rows once the buffer exceeds the ceiling.
    fn bound_retained(&self, state: &mut WriterState) {
        while state.buffer.len() > self.config.max_retained {
            state.buffer.pop_front();
            state.records_dropped += 1;
        }
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        // Writer state stays consistent across a panicking holder; recover
        // the guard and keep logging.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// File name prefix of this log stream
    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// Path of the active log file
    pub fn active_path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Number of rows currently buffered in memory
    pub fn buffered(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Total rows written to disk over the writer's lifetime
    pub fn records_written(&self) -> u64 {
        self.lock().records_written
    }

    /// Rows dropped from the retained buffer after failed flushes
    pub fn records_dropped(&self) -> u64 {
        self.lock().records_dropped
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("LogWriter")
            .field("prefix", &self.config.prefix)
            .field("path", &state.path)
            .field("buffered", &state.buffer.len())
            .field("file_size", &state.file_size)
            .finish()
    }
}

/// Open a fresh log file named `<prefix>_<YYYYMMDD_HHMMSS>.csv` and write
/// its header row. Same-second collisions get a numeric suffix so rotation
/// always yields a new file.
fn open_log_file(config: &WriterConfig) -> Result<(File, PathBuf, u64), WriterError> {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let mut path = config.dir.join(format!("{}_{}.csv", config.prefix, stamp));
    let mut suffix = 1;
    while path.exists() {
        path = config
            .dir
            .join(format!("{}_{}_{}.csv", config.prefix, stamp, suffix));
        suffix += 1;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| WriterError::OpenFile {
            path: path.clone(),
            source,
        })?;

    let mut header = String::from("timestamp");
    for field in &config.fields {
        header.push(',');
        header.push_str(field);
    }
    header.push('\n');

    file.write_all(header.as_bytes())
        .map_err(|source| WriterError::OpenFile {
            path: path.clone(),
            source,
        })?;

    let file_size = header.len() as u64;
    Ok((file, path, file_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> WriterConfig {
        WriterConfig::new("eeg", vec!["a".to_string(), "b".to_string()])
            .with_dir(dir.path())
            .with_buffer_capacity(4)
    }

    fn read_lines(path: &std::path::Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    fn log_files(dir: &TempDir) -> Vec<PathBuf> {
        let mut files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_create_writes_header() {
        let dir = TempDir::new().unwrap();
        let writer = LogWriter::create(test_config(&dir)).unwrap();

        let lines = read_lines(&writer.active_path());
        assert_eq!(lines, vec!["timestamp,a,b"]);
    }

    #[test]
    fn test_create_makes_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/logs");
        let config = WriterConfig::new("eeg", vec![]).with_dir(&nested);

        let writer = LogWriter::create(config).unwrap();
        assert!(nested.exists());
        assert!(writer.active_path().starts_with(&nested));
    }

    #[test]
    fn test_write_buffers_until_capacity() {
        let dir = TempDir::new().unwrap();
        let writer = LogWriter::create(test_config(&dir)).unwrap();

        writer.write("t1,1,2").unwrap();
        writer.write("t2,3,4").unwrap();
        writer.write("t3,5,6").unwrap();
        assert_eq!(writer.buffered(), 3);
        // Nothing on disk but the header yet.
        assert_eq!(read_lines(&writer.active_path()).len(), 1);

        // Fourth write reaches capacity and flushes synchronously.
        writer.write("t4,7,8").unwrap();
        assert_eq!(writer.buffered(), 0);

        let lines = read_lines(&writer.active_path());
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "t1,1,2");
        assert_eq!(lines[4], "t4,7,8");
        assert_eq!(writer.records_written(), 4);
    }

    #[test]
    fn test_flush_empty_buffer_is_noop() {
        let dir = TempDir::new().unwrap();
        let writer = LogWriter::create(test_config(&dir)).unwrap();

        writer.flush().unwrap();
        writer.flush().unwrap();
        assert_eq!(read_lines(&writer.active_path()).len(), 1);
        assert_eq!(writer.records_written(), 0);
    }

    #[test]
    fn test_explicit_flush_drains_partial_buffer() {
        let dir = TempDir::new().unwrap();
        let writer = LogWriter::create(test_config(&dir)).unwrap();

        writer.write("t1,1,2").unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.buffered(), 0);
        assert_eq!(read_lines(&writer.active_path()).len(), 2);
    }

    #[test]
    fn test_rotation_creates_new_file_with_header() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir).with_rotate_bytes(32);
        let writer = LogWriter::create(config).unwrap();

        let first_path = writer.active_path();
        writer.write("t1,11111111,22222222").unwrap();
        writer.flush().unwrap();
        // First flush landed in the original file, which is now oversized.
        assert_eq!(writer.active_path(), first_path);

        writer.write("t2,3,4").unwrap();
        writer.flush().unwrap();

        let second_path = writer.active_path();
        assert_ne!(second_path, first_path);
        assert_eq!(log_files(&dir).len(), 2);

        // Old file unchanged, new file starts with a fresh header.
        let first = read_lines(&first_path);
        assert_eq!(first, vec!["timestamp,a,b", "t1,11111111,22222222"]);
        let second = read_lines(&second_path);
        assert_eq!(second, vec!["timestamp,a,b", "t2,3,4"]);
    }

    #[test]
    fn test_rotation_checked_at_flush_not_write() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir)
            .with_rotate_bytes(8)
            .with_buffer_capacity(100);
        let writer = LogWriter::create(config).unwrap();
        let first_path = writer.active_path();

        // The header alone exceeds the threshold, but writes never rotate.
        writer.write("t1,1,2").unwrap();
        writer.write("t2,3,4").unwrap();
        assert_eq!(writer.active_path(), first_path);

        // The flush rotates before appending anything.
        writer.flush().unwrap();
        assert_ne!(writer.active_path(), first_path);
        assert_eq!(read_lines(&first_path), vec!["timestamp,a,b"]);
        assert_eq!(
            read_lines(&writer.active_path()),
            vec!["timestamp,a,b", "t1,1,2", "t2,3,4"]
        );
    }

    #[test]
    fn test_same_second_rotations_get_distinct_files() {
        let dir = TempDir::new().unwrap();
        // Rotate on every flush after the first.
        let config = test_config(&dir).with_rotate_bytes(0).with_buffer_capacity(100);
        let writer = LogWriter::create(config).unwrap();

        for i in 0..3 {
            writer.write(format!("t{},1,2", i)).unwrap();
            writer.flush().unwrap();
        }

        // Three rotations within the same second must not collide.
        assert_eq!(log_files(&dir).len(), 4);
    }

    #[test]
    fn test_records_survive_across_rotations() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir).with_rotate_bytes(64).with_buffer_capacity(2);
        let writer = LogWriter::create(config).unwrap();

        for i in 0..20 {
            writer.write(format!("t{},{},{}", i, i, i)).unwrap();
        }
        writer.flush().unwrap();

        let mut data_rows = 0;
        for path in log_files(&dir) {
            let lines = read_lines(&path);
            assert_eq!(lines[0], "timestamp,a,b");
            data_rows += lines.len() - 1;
        }
        assert_eq!(data_rows, 20);
        assert_eq!(writer.records_written(), 20);
    }
}
