//! Connection configuration for the record store.
//!
//! Every operation opens its own connection and applies a [`StoreConfig`]
//! to it. The configuration is YAML-serializable; omitted fields take their
//! defaults.
//!
//! # Example YAML
//!
//! ```yaml
//! busy_timeout_ms: 5000
//! journal_mode: wal
//! synchronous: normal
//! primary_key: id
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Default time a connection waits on a locked database, in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default primary key field name.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// SQLite `journal_mode` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Rollback journal, deleted at commit (SQLite's default).
    #[default]
    Delete,
    /// Write-ahead log.
    Wal,
}

impl JournalMode {
    fn as_pragma(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Wal => "WAL",
        }
    }
}

/// SQLite `synchronous` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SynchronousMode {
    #[default]
    Full,
    Normal,
}

impl SynchronousMode {
    fn as_pragma(self) -> &'static str {
        match self {
            SynchronousMode::Full => "FULL",
            SynchronousMode::Normal => "NORMAL",
        }
    }
}

/// Settings applied to every connection a [`RecordStore`](crate::RecordStore)
/// opens.
///
/// # Examples
///
/// ```
/// use record_store_sqlite::{JournalMode, StoreConfig};
///
/// let config: StoreConfig = serde_yaml::from_str("journal_mode: wal").unwrap();
/// assert_eq!(config.journal_mode, JournalMode::Wal);
/// assert_eq!(config.busy_timeout_ms, 5000);
/// assert_eq!(config.primary_key, "id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Journal mode pragma.
    pub journal_mode: JournalMode,
    /// Synchronous pragma.
    pub synchronous: SynchronousMode,
    /// Primary key field used when a caller does not name one.
    pub primary_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: JournalMode::default(),
            synchronous: SynchronousMode::default(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
        }
    }
}

impl StoreConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::StoreError::IoError) if the file cannot be
    /// read, or [`YamlError`](crate::StoreError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Applies the busy timeout and pragmas to a connection.
    pub fn apply(&self, conn: &Connection) -> Result<()> {
        conn.busy_timeout(Duration::from_millis(self.busy_timeout_ms))?;
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            self.journal_mode.as_pragma(),
            |row| row.get(0),
        )?;
        conn.pragma_update(None, "synchronous", self.synchronous.as_pragma())?;
        debug!(journal_mode = %mode, synchronous = self.synchronous.as_pragma(), "configured connection");
        Ok(())
    }
}
