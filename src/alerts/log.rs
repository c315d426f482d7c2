//! Append-only alert log
//!
//! One alert per line, prefixed with an RFC 3339 timestamp, so the file can be tailed:
//!
//! ```text
//! 2025-03-01T12:00:00.123456Z: High number of slow queries: 15 (threshold: 10)
//! ```

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::evaluator::Alert;

#[derive(Debug, Clone)]
pub struct AlertLog {
    path: PathBuf,
}

impl AlertLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and flush it before returning.
    pub async fn append(&self, alert: &Alert, timestamp: DateTime<Utc>) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(Self::format_line(alert, timestamp).as_bytes())
            .await?;
        file.flush().await
    }

    /// Line breaks inside the alert text are flattened to keep one alert per line.
    pub fn format_line(alert: &Alert, timestamp: DateTime<Utc>) -> String {
        let text = alert.message.replace(['\r', '\n'], " ");
        format!(
            "{}: {text}\n",
            timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
    }
}
