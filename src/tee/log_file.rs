//! Line-flushed log file sink

use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TeeError;

/// How an existing log file is treated when the tee starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Keep previous contents and add records at the end
    #[default]
    Append,
    /// Discard previous contents
    Truncate,
}

/// Log file opened for records, flushed after every line
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    writer: LineWriter<File>,
}

impl LogFile {
    /// Open (creating parent directories and the file as needed)
    pub fn open(path: &Path, mode: LogMode) -> Result<Self, TeeError> {
        let open_err = |source| TeeError::OpenLog {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            LogMode::Append => options.append(true),
            LogMode::Truncate => options.write(true).truncate(true),
        };
        let file = options.open(path).map_err(open_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: LineWriter::new(file),
        })
    }

    /// Path the file was opened at
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one record and flush it to the OS
    pub fn write_record(&mut self, record: &str) -> Result<(), TeeError> {
        self.writer
            .write_all(record.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(TeeError::LogFile)
    }

    /// Flush anything still buffered
    pub fn flush(&mut self) -> Result<(), TeeError> {
        self.writer.flush().map_err(TeeError::LogFile)
    }

    /// Flush and close the file
    pub fn close(self) -> Result<(), TeeError> {
        let file = self
            .writer
            .into_inner()
            .map_err(|e| TeeError::LogFile(e.into_error()))?;
        file.sync_all().map_err(TeeError::LogFile)
    }
}
