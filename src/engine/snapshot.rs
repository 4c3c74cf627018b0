//! Persisted blocklist snapshot.
//!
//! Stored as gzip-compressed JSON with the schema
//! `{ update_timestamp, blocklists, blocked_names }`. Writes go to a sibling
//! temporary file that is renamed over the target, so a concurrent reader
//! sees either the old or the new snapshot.

use super::blockmap::BlockMap;
use crate::error::{BlocklistError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlocklistConfiguration {
    /// Seconds since the epoch at which the merge completed.
    pub update_timestamp: u64,
    /// Sources merged into `blocked_names`, in configured order.
    pub blocklists: Vec<String>,
    /// Shared with the published map so both always hold the same set.
    pub blocked_names: Arc<BlockMap>,
}

impl StoredBlocklistConfiguration {
    pub fn new(
        update_timestamp: u64,
        blocklists: Vec<String>,
        blocked_names: Arc<BlockMap>,
    ) -> Self {
        Self {
            update_timestamp,
            blocklists,
            blocked_names,
        }
    }

    /// Reads a snapshot from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BlocklistError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => {
                return Err(BlocklistError::io(
                    format!("failed to open snapshot {}", path.display()),
                    e,
                ))
            }
        };

        let decoder = GzDecoder::new(BufReader::new(file));
        // serde_json surfaces decompression failures as io-category errors,
        // so both layers land in CorruptSnapshot.
        serde_json::from_reader(BufReader::new(decoder)).map_err(|e| {
            BlocklistError::CorruptSnapshot {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }

    /// Writes the snapshot to `path` atomically.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = temp_path_for(path);

        let write_tmp = || -> io::Result<()> {
            let file = File::create(&tmp_path)?;
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            serde_json::to_writer(&mut encoder, self)?;
            let mut writer = encoder.finish()?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        };

        if let Err(e) = write_tmp() {
            let _ = fs::remove_file(&tmp_path);
            return Err(BlocklistError::io(
                format!("failed to write snapshot {}", tmp_path.display()),
                e,
            ));
        }

        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            BlocklistError::io(format!("failed to replace snapshot {}", path.display()), e)
        })?;

        debug!(
            path = %path.display(),
            entries = self.blocked_names.len(),
            "Persisted blocklist snapshot"
        );
        Ok(())
    }

    /// True once more than `max_age` has passed since the last merge.
    pub fn needs_update(&self, max_age: Duration) -> bool {
        self.needs_update_at(unix_now(), max_age)
    }

    /// `needs_update` against an explicit clock reading (seconds since epoch).
    pub fn needs_update_at(&self, now: u64, max_age: Duration) -> bool {
        now > self.update_timestamp.saturating_add(max_age.as_secs())
    }
}

/// Current wall-clock time in whole seconds since the epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "blocklist".into());
    name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> StoredBlocklistConfiguration {
        let map = BlockMap::from_entries(
            ["ads.example.com", "tracker.net", "pixel.example.org"]
                .iter()
                .map(|s| s.to_string().into_boxed_str()),
        );
        StoredBlocklistConfiguration::new(
            1_700_000_000,
            vec![
                "https://lists.example/hosts".to_string(),
                "file:///etc/ads/local.txt".to_string(),
            ],
            Arc::new(map),
        )
    }

    #[test]
    fn test_persist_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocklist.json.gz");

        let config = sample();
        config.persist(&path).unwrap();
        let loaded = StoredBlocklistConfiguration::load(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.blocklists[0], "https://lists.example/hosts");
        assert!(loaded.blocked_names.contains("pixel.example.org"));
    }

    #[test]
    fn test_persist_replaces_existing_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocklist.json.gz");

        sample().persist(&path).unwrap();
        let newer =
            StoredBlocklistConfiguration::new(1_700_000_500, vec![], Arc::new(BlockMap::new()));
        newer.persist(&path).unwrap();

        assert_eq!(StoredBlocklistConfiguration::load(&path).unwrap(), newer);
        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = StoredBlocklistConfiguration::load(dir.path().join("absent.gz")).unwrap_err();
        assert!(matches!(err, BlocklistError::NotFound { .. }));
    }

    #[test]
    fn test_load_rejects_corrupt_files() {
        let dir = TempDir::new().unwrap();

        // Not gzip at all
        let path = dir.path().join("garbage.gz");
        fs::write(&path, b"definitely not gzip").unwrap();
        let err = StoredBlocklistConfiguration::load(&path).unwrap_err();
        assert!(matches!(err, BlocklistError::CorruptSnapshot { .. }));

        // Valid gzip, wrong schema
        let path = dir.path().join("schema.gz");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(br#"{"update_timestamp":"yesterday"}"#).unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();
        let err = StoredBlocklistConfiguration::load(&path).unwrap_err();
        assert!(matches!(err, BlocklistError::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_needs_update_boundary() {
        let config = StoredBlocklistConfiguration::new(1_000, vec![], Arc::new(BlockMap::new()));
        let max_age = Duration::from_secs(3_600);

        assert!(!config.needs_update_at(1_000, max_age));
        assert!(!config.needs_update_at(4_600, max_age));
        assert!(config.needs_update_at(4_601, max_age));
    }

    #[test]
    fn test_needs_update_against_wall_clock() {
        let fresh =
            StoredBlocklistConfiguration::new(unix_now(), vec![], Arc::new(BlockMap::new()));
        assert!(!fresh.needs_update(Duration::from_secs(3_600)));

        let stale = StoredBlocklistConfiguration::new(0, vec![], Arc::new(BlockMap::new()));
        assert!(stale.needs_update(Duration::from_secs(3_600)));
    }
}
