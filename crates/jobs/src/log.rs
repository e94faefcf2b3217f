//! Per-run log sink: lines buffer in memory and flush to a timestamped
//! file. The buffer is private to one run; concurrent runs never share it.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

/// Buffered log for a single job run.
pub struct RunLog {
    path: PathBuf,
    lines: Vec<String>,
}

impl RunLog {
    /// Creates a log sink named after the job and the current time.
    pub fn new(dir: &Path, job_name: &str) -> Self {
        // Colons are not valid in filenames everywhere.
        let timestamp = Utc::now().to_rfc3339().replace(':', "-");
        Self {
            path: dir.join(format!("{job_name}-{timestamp}.log")),
            lines: Vec::new(),
        }
    }

    /// Appends one timestamped line to the buffer and mirrors it to tracing.
    pub fn line(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!("{message}");
        self.lines.push(format!("[{}] {message}", Utc::now().to_rfc3339()));
    }

    /// Appends one timestamped error line.
    pub fn error(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::error!("{message}");
        self.lines
            .push(format!("[{}] ERROR: {message}", Utc::now().to_rfc3339()));
    }

    /// Writes all buffered lines to the log file, creating the directory if
    /// needed. The buffer is cleared on success.
    pub async fn flush(&mut self) -> std::io::Result<&Path> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut contents = self.lines.join("\n");
        contents.push('\n');
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;

        self.lines.clear();
        Ok(&self.path)
    }

    /// The file this run's log flushes to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
