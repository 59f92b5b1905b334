//! Long-term player statistics.
//!
//! Stats are loaded when a player joins and saved when they leave or a match
//! they took part in ends. The server only talks to the `StatsManager` trait;
//! `MemoryStats` keeps everything in process and `FileStats` persists a
//! bincode-encoded table to disk.

use log::debug;
use serde::{Deserialize, Serialize};
use shared::PlayerStats;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("stats file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("stats file is corrupt: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Load/save hook for per-player statistics, keyed by player name.
pub trait StatsManager: Send {
    /// Returns the stored stats, or fresh ones for an unknown name.
    fn load(&mut self, name: &str) -> PlayerStats;

    fn save(&mut self, name: &str, stats: &PlayerStats) -> Result<(), StatsError>;

    /// Writes anything still buffered.
    fn flush(&mut self) -> Result<(), StatsError>;
}

/// Stats that live as long as the server process.
#[derive(Debug, Default)]
pub struct MemoryStats {
    players: HashMap<String, PlayerStats>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsManager for MemoryStats {
    fn load(&mut self, name: &str) -> PlayerStats {
        self.players.get(name).cloned().unwrap_or_default()
    }

    fn save(&mut self, name: &str, stats: &PlayerStats) -> Result<(), StatsError> {
        self.players.insert(name.to_string(), stats.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StatsError> {
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StatsFile {
    players: BTreeMap<String, PlayerStats>,
}

/// Stats persisted to a single file.
///
/// Saves are buffered in memory; `flush` rewrites the file once if anything
/// changed since the last write.
#[derive(Debug)]
pub struct FileStats {
    path: PathBuf,
    contents: StatsFile,
    dirty: bool,
}

impl FileStats {
    /// Opens the stats file at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StatsError> {
        let path = path.as_ref().to_path_buf();
        let contents = match fs::read(&path) {
            Ok(bytes) => bincode::deserialize(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No stats file at {}, starting empty", path.display());
                StatsFile::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            contents,
            dirty: false,
        })
    }

    pub fn len(&self) -> usize {
        self.contents.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.players.is_empty()
    }

    /// Whether saves are waiting for a flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn write(&self) -> Result<(), StatsError> {
        let bytes = bincode::serialize(&self.contents)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StatsManager for FileStats {
    fn load(&mut self, name: &str) -> PlayerStats {
        self.contents.players.get(name).cloned().unwrap_or_default()
    }

    fn save(&mut self, name: &str, stats: &PlayerStats) -> Result<(), StatsError> {
        self.contents
            .players
            .insert(name.to_string(), stats.clone());
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StatsError> {
        if !self.dirty {
            return Ok(());
        }
        self.write()?;
        self.dirty = false;
        Ok(())
    }
}
