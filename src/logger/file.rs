/// File persistence for log lines
///
/// Lines are appended to `logs/rosrelay_<date>.log`. File logging stays
/// disabled until `init_file_logging` succeeds, so tests and tools that never
/// call `logger::init()` only write to the console.
use chrono::Local;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

const LOG_DIR: &str = "logs";

static LOG_FILE: Lazy<Mutex<Option<BufWriter<File>>>> = Lazy::new(|| Mutex::new(None));

fn log_file_path() -> PathBuf {
    PathBuf::from(LOG_DIR).join(format!("rosrelay_{}.log", Local::now().format("%Y-%m-%d")))
}

/// Open (or create) today's log file
pub fn init_file_logging() {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("Failed to create log directory '{}': {}", LOG_DIR, e);
        return;
    }

    let path = log_file_path();
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            *LOG_FILE.lock() = Some(BufWriter::new(file));
        }
        Err(e) => {
            eprintln!("Failed to open log file '{}': {}", path.display(), e);
        }
    }
}

/// Append one line to the log file (no-op if file logging is off)
pub fn write_to_file(line: &str) {
    let mut guard = LOG_FILE.lock();
    if let Some(writer) = guard.as_mut() {
        if writeln!(writer, "{}", line).is_err() {
            // Disk full or file removed; stop trying
            *guard = None;
        }
    }
}

pub fn flush_file_logging() {
    if let Some(writer) = LOG_FILE.lock().as_mut() {
        let _ = writer.flush();
    }
}
