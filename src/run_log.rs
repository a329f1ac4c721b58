//! The human-readable log written alongside the split files.

use crate::{sink::CompletedFile, Error};
use chrono::{DateTime, Local};
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

const LOG_STEM: &str = "csv_splitter";

/// Picks the log file path for a run started at `started`.
///
/// Without an explicit path the log goes into `output_dir` as
/// `csv_splitter_{YYYY-MM-DD_HHMM}.log`. If that file already exists, `_1`,
/// `_2`, ... is appended to the stem until the name is free.
pub fn log_path(output_dir: &Path, explicit: Option<&Path>, started: DateTime<Local>) -> PathBuf {
    let base = match explicit {
        Some(path) => path.to_owned(),
        None => output_dir.join(format!(
            "{LOG_STEM}_{}.log",
            started.format("%Y-%m-%d_%H%M")
        )),
    };

    if !base.exists() {
        return base;
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| LOG_STEM.to_owned());
    let extension = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_owned());

    (1..)
        .map(|n| base.with_file_name(format!("{stem}_{n}.{extension}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

/// Appends a single line to `path`, creating it if needed.
///
/// Used for failures that happen before a run log could be opened.
pub fn append_line(path: &Path, line: &str) -> Result<(), Error> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// An open run log.
///
/// The end time is always recorded: by [finish] on the normal path, or when
/// the log is dropped if a run bails out before reaching it.
///
/// [finish]: RunLog::finish
pub struct RunLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl RunLog {
    /// Creates the log at `path` and writes the preamble.
    pub fn create(path: PathBuf, started: DateTime<Local>) -> Result<Self, Error> {
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "CSV Splitting Log")?;
        writeln!(writer, "Version: {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(writer, "Start time: {}", timestamp(started))?;

        Ok(Self {
            path,
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, line: &str) -> Result<(), Error> {
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }

    pub fn file_created(&mut self, file: &CompletedFile) -> Result<(), Error> {
        self.line(&format!(
            "Created file: {} ({} rows, {} bytes)",
            file.path.display(),
            file.rows,
            file.bytes
        ))
    }

    pub fn error(&mut self, error: &Error) -> Result<(), Error> {
        self.line(&format!("An error occurred: {error}"))
    }

    /// Writes the end time and closes the log.
    pub fn finish(mut self) -> Result<PathBuf, Error> {
        if let Some(writer) = self.writer.take() {
            write_end(writer)?;
        }
        Ok(std::mem::take(&mut self.path))
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = write_end(writer) {
                tracing::warn!(path = %self.path.display(), "Failed to finalize run log: {e}");
            }
        }
    }
}

fn write_end(mut writer: BufWriter<File>) -> Result<(), Error> {
    writeln!(writer, "End time: {}", timestamp(Local::now()))?;
    writer.flush()?;
    Ok(())
}

fn timestamp(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}
