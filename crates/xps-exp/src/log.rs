//! Repetition log files: a comma separated header line naming the tags,
//! then one newline-terminated line per completed iteration.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Writer, WriterBuilder};
use indexmap::IndexMap;
use xps_core::errors::{ErrorInfo, XpsError};
use xps_core::ParamValue;

/// One logged iteration: tag to value, in emission order.
pub type Row = IndexMap<String, ParamValue>;

/// Path of the log owned by repetition `rep` of the experiment in `dir`.
pub fn log_path(dir: &Path, rep: usize) -> PathBuf {
    dir.join(format!("{rep}.log"))
}

/// Persisted state of a log as seen by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStatus {
    /// Tags from the header line, if a complete header exists.
    pub header: Option<Vec<String>>,
    /// Number of complete data rows.
    pub rows: usize,
    /// Byte length covering only complete lines.
    pub complete_len: u64,
}

fn wrap_csv(code: &str, path: &Path, err: csv::Error) -> XpsError {
    XpsError::Io(
        ErrorInfo::new(code, "log file failure")
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}

/// Inspects a log without interpreting its values. Returns `None` when absent.
pub fn inspect_log(path: &Path) -> Result<Option<LogStatus>, XpsError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|err| XpsError::io("log-read", path, err))?;
    let complete_len = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |idx| idx + 1);
    let lines = bytes[..complete_len].iter().filter(|b| **b == b'\n').count();
    let header = if lines > 0 {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(&bytes[..complete_len]);
        let record = reader
            .headers()
            .map_err(|err| wrap_csv("log-header", path, err))?;
        Some(record.iter().map(str::to_string).collect())
    } else {
        None
    };
    Ok(Some(LogStatus {
        header,
        rows: lines.saturating_sub(1),
        complete_len: complete_len as u64,
    }))
}

/// Header tags and raw string rows of a log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogTable {
    pub tags: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Reads all complete rows of a log. Returns `None` when the file is absent.
pub fn read_log(path: &Path) -> Result<Option<LogTable>, XpsError> {
    let Some(status) = inspect_log(path)? else {
        return Ok(None);
    };
    let Some(tags) = status.header else {
        return Ok(Some(LogTable::default()));
    };
    let bytes = fs::read(path).map_err(|err| XpsError::io("log-read", path, err))?;
    let end = (status.complete_len as usize).min(bytes.len());
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(&bytes[..end]);
    let mut rows = Vec::with_capacity(status.rows);
    for record in reader.records() {
        let record = record.map_err(|err| wrap_csv("log-record", path, err))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Some(LogTable { tags, rows }))
}

/// Incremental writer that flushes after every row.
pub struct LogWriter {
    writer: Writer<File>,
    header: Option<Vec<String>>,
    path: PathBuf,
}

impl LogWriter {
    /// Opens a fresh log, discarding any previous content.
    pub fn create(path: &Path) -> Result<Self, XpsError> {
        let file = File::create(path).map_err(|err| XpsError::io("log-create", path, err))?;
        Ok(Self::from_file(file, None, path))
    }

    /// Opens an existing log for appending after its last complete line.
    pub fn append(path: &Path, status: &LogStatus) -> Result<Self, XpsError> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|err| XpsError::io("log-open", path, err))?;
        // Drop a half-written trailing line left by an interrupted write.
        file.set_len(status.complete_len)
            .map_err(|err| XpsError::io("log-truncate", path, err))?;
        Ok(Self::from_file(file, status.header.clone(), path))
    }

    fn from_file(file: File, header: Option<Vec<String>>, path: &Path) -> Self {
        let writer = WriterBuilder::new().has_headers(false).from_writer(file);
        Self {
            writer,
            header,
            path: path.to_path_buf(),
        }
    }

    /// Appends one row, writing the header first if the log is new.
    pub fn write_row(&mut self, row: &Row) -> Result<(), XpsError> {
        if row.is_empty() {
            return Err(XpsError::Validation(
                ErrorInfo::new("empty-log-row", "iteration returned no values")
                    .with_context("path", self.path.display().to_string()),
            ));
        }
        if self.header.is_none() {
            let tags: Vec<String> = row.keys().cloned().collect();
            self.writer
                .write_record(&tags)
                .map_err(|err| wrap_csv("log-write-header", &self.path, err))?;
            self.header = Some(tags);
        }
        let header = self.header.as_deref().unwrap_or_default();
        if header.len() != row.len() || header.iter().any(|tag| !row.contains_key(tag)) {
            return Err(XpsError::Validation(
                ErrorInfo::new("log-tag-mismatch", "row tags differ from the log header")
                    .with_context("path", self.path.display().to_string())
                    .with_context("header", header.join(","))
                    .with_context(
                        "row",
                        row.keys().cloned().collect::<Vec<_>>().join(","),
                    ),
            ));
        }
        let record: Vec<String> = header.iter().map(|tag| field(&row[tag])).collect();
        self.writer
            .write_record(&record)
            .map_err(|err| wrap_csv("log-write-row", &self.path, err))?;
        self.writer
            .flush()
            .map_err(|err| XpsError::io("log-flush", &self.path, err))
    }

    /// Flushes and closes the log.
    pub fn finish(mut self) -> Result<(), XpsError> {
        self.writer
            .flush()
            .map_err(|err| XpsError::io("log-flush", &self.path, err))
    }
}

/// Line breaks would split a row across lines, so they become spaces.
fn field(value: &ParamValue) -> String {
    value.to_string().replace(['\r', '\n'], " ")
}
