//! Durable local snapshot of registry package names.
//!
//! Two artifacts live in the download directory:
//! - `npm-registry.json`: JSON array of package names
//! - `.sequence`: change feed position as plain integer text
//!
//! Both are written to temp files first and renamed into place. The sequence
//! marker is removed before the names file is replaced and restored last, so
//! a reader sees either the old pair, the new pair, or names without a
//! sequence (which forces a full sync). It never sees a mismatched pair.
//! A sequence marker without a usable names file is discarded, so a lost or
//! corrupt names file also forces a full sync.

use crate::types::{NameCheckError, Result, Snapshot};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

pub const NAMES_FILE: &str = "npm-registry.json";
pub const SEQUENCE_FILE: &str = ".sequence";

/// File-backed snapshot with an in-memory cache.
///
/// Once loaded, the snapshot is served from memory for the lifetime of the
/// store; only writes go back to disk.
#[derive(Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    cache: Option<Snapshot>,
}

impl SnapshotStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, cache: None })
    }

    pub fn names_path(&self) -> PathBuf {
        self.dir.join(NAMES_FILE)
    }

    pub fn sequence_path(&self) -> PathBuf {
        self.dir.join(SEQUENCE_FILE)
    }

    /// Current snapshot, read from disk on first access.
    ///
    /// Missing artifacts yield an empty set or absent sequence. A names file
    /// that fails to parse is deleted and treated as missing. Without names
    /// the sequence marker is meaningless and is dropped too.
    pub fn load(&mut self) -> Result<&Snapshot> {
        if self.cache.is_none() {
            let (names, sequence) = match self.read_names()? {
                Some(names) => (names, self.read_sequence()?),
                None => {
                    if self.sequence_path().exists() {
                        warn!("Discarding sequence marker without a names file");
                        remove_if_exists(&self.sequence_path())?;
                    }
                    (BTreeSet::new(), None)
                }
            };
            debug!(
                "Loaded snapshot: {} names, sequence {:?}",
                names.len(),
                sequence
            );
            self.cache = Some(Snapshot { names, sequence });
        }
        Ok(self.cache.get_or_insert_with(Snapshot::default))
    }

    /// Replace the snapshot with `names` at `sequence`.
    pub fn save(&mut self, names: BTreeSet<String>, sequence: u64) -> Result<()> {
        self.check_sequence(sequence)?;
        write_pair(&self.dir, &names, sequence)?;
        self.cache = Some(Snapshot {
            names,
            sequence: Some(sequence),
        });
        Ok(())
    }

    /// Add `ids` to the current names and persist at `sequence`.
    ///
    /// Ids already present are ignored, so replaying a change is harmless.
    /// Returns how many names were new.
    pub fn merge<I>(&mut self, ids: I, sequence: u64) -> Result<usize>
    where
        I: IntoIterator<Item = String>,
    {
        self.load()?;
        self.check_sequence(sequence)?;
        let Some(snapshot) = self.cache.as_mut() else {
            return Ok(0);
        };

        let before = snapshot.names.len();
        snapshot.names.extend(ids);
        let added = snapshot.names.len() - before;

        if let Err(e) = write_pair(&self.dir, &snapshot.names, sequence) {
            // The cached set no longer matches disk; re-read on next access.
            self.cache = None;
            return Err(e);
        }
        snapshot.sequence = Some(sequence);
        debug!("Merged {} new names at sequence {}", added, sequence);
        Ok(added)
    }

    /// Whether the names file is missing or older than `max_age_minutes`.
    pub fn is_stale(&self, max_age_minutes: u64) -> Result<bool> {
        let modified = match fs::metadata(self.names_path()) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };

        // A clock set behind the file time counts as fresh.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(age > Duration::from_secs(max_age_minutes.saturating_mul(60)))
    }

    fn check_sequence(&mut self, sequence: u64) -> Result<()> {
        match self.load()?.sequence {
            Some(current) if sequence < current => Err(NameCheckError::SequenceRegression {
                current,
                attempted: sequence,
            }),
            _ => Ok(()),
        }
    }

    fn read_names(&self) -> Result<Option<BTreeSet<String>>> {
        let path = self.names_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_reader::<_, Vec<String>>(BufReader::new(file)) {
            Ok(names) => Ok(Some(names.into_iter().collect())),
            Err(e) => {
                warn!("Discarding corrupt names file {}: {}", path.display(), e);
                remove_if_exists(&path)?;
                Ok(None)
            }
        }
    }

    fn read_sequence(&self) -> Result<Option<u64>> {
        let path = self.sequence_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match content.trim().parse::<u64>() {
            Ok(sequence) => Ok(Some(sequence)),
            Err(e) => {
                warn!("Discarding corrupt sequence file {}: {}", path.display(), e);
                remove_if_exists(&path)?;
                Ok(None)
            }
        }
    }
}

/// Write both artifacts so readers never see a mismatched pair.
fn write_pair(dir: &Path, names: &BTreeSet<String>, sequence: u64) -> Result<()> {
    let names_path = dir.join(NAMES_FILE);
    let sequence_path = dir.join(SEQUENCE_FILE);
    let names_tmp = dir.join(format!("{}.tmp", NAMES_FILE));
    let sequence_tmp = dir.join(format!("{}.tmp", SEQUENCE_FILE));

    let mut writer = BufWriter::new(File::create(&names_tmp)?);
    serde_json::to_writer(&mut writer, names)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    let mut file = File::create(&sequence_tmp)?;
    file.write_all(sequence.to_string().as_bytes())?;
    file.sync_all()?;

    remove_if_exists(&sequence_path)?;
    fs::rename(&names_tmp, &names_path)?;
    fs::rename(&sequence_tmp, &sequence_path)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
