//! Candidate XTEA key lookup for encrypted group payloads.
//!
//! Keys are collected from a directory of JSON key files, one file per
//! game version (`<version>.json`), each mapping a group name to its four
//! key words:
//!
//! ```json
//! { "l40_55": [-1920480496, 558159269, -1549211620, 661257486] }
//! ```
//!
//! A group name can accumulate key sets from several versions; lookups
//! order exact-version matches ahead of the rest so callers can trial
//! decrypt candidates in priority order.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, error};

use crate::xtea::XteaKey;

/// A 128-bit key together with the game version it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XteaKeySet {
    /// Game version (build number) this key was captured for.
    pub game_version: u32,
    /// The key itself.
    pub key: XteaKey,
}

/// Store of candidate XTEA key sets, keyed by group name.
#[derive(Debug, Clone, Default)]
pub struct XteaKeyStore {
    keys: HashMap<String, Vec<XteaKeySet>>,
}

impl XteaKeyStore {
    /// Create an empty key store.
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Load every `<version>.json` key file in `dir`.
    ///
    /// A missing or unreadable directory is logged and yields an empty
    /// store; lookups then simply return no candidates. Individual
    /// malformed files are skipped with a log line.
    pub fn load(dir: &Path) -> Self {
        let mut store = Self::empty();

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                error!("XTEA keys could not be loaded from {}: {err}", dir.display());
                return store;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let Some(version) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u32>().ok())
            else {
                debug!("Skipping key file without a version stem: {}", path.display());
                continue;
            };

            match store.load_file(&path, version) {
                Ok(count) => debug!("Loaded {count} key(s) for version {version}"),
                Err(err) => error!("Error loading key file {}: {err}", path.display()),
            }
        }

        store
    }

    fn load_file(&mut self, path: &Path, game_version: u32) -> Result<usize, std::io::Error> {
        let content = fs::read_to_string(path)?;
        let table: HashMap<String, [i32; 4]> = serde_json::from_str(&content)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

        let count = table.len();
        for (name, words) in table {
            self.add(
                &name,
                XteaKeySet {
                    game_version,
                    key: XteaKey(words),
                },
            );
        }
        Ok(count)
    }

    /// Register a key set for a group name.
    pub fn add(&mut self, name: &str, key_set: XteaKeySet) {
        self.keys.entry(name.to_string()).or_default().push(key_set);
    }

    /// Candidate key sets for a group name, best match first.
    ///
    /// When a game version is given, key sets captured for exactly that
    /// version come first; remaining key sets follow in load order as
    /// fallbacks. An unknown name yields no candidates.
    pub fn candidates(&self, name: &str, game_version: Option<u32>) -> Vec<XteaKeySet> {
        let Some(sets) = self.keys.get(name) else {
            return Vec::new();
        };

        match game_version {
            Some(version) => {
                let (matching, rest): (Vec<_>, Vec<_>) = sets
                    .iter()
                    .copied()
                    .partition(|set| set.game_version == version);
                matching.into_iter().chain(rest).collect()
            }
            None => sets.clone(),
        }
    }

    /// Number of group names with at least one key set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the store holds no keys at all.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_empty_store() {
        let store = XteaKeyStore::empty();
        assert!(store.is_empty());
        assert!(store.candidates("l40_55", Some(462)).is_empty());
    }

    #[test]
    fn test_missing_directory_degrades() {
        let store = XteaKeyStore::load(Path::new("/nonexistent/keys"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = TempDir::new().expect("temp dir");
        let mut file =
            std::fs::File::create(dir.path().join("462.json")).expect("create key file");
        write!(file, r#"{{"l40_55": [1, 2, 3, 4], "l41_55": [5, 6, 7, 8]}}"#)
            .expect("write key file");

        let store = XteaKeyStore::load(dir.path());
        assert_eq!(store.len(), 2);

        let candidates = store.candidates("l40_55", Some(462));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].game_version, 462);
        assert_eq!(candidates[0].key, XteaKey([1, 2, 3, 4]));
    }

    #[test]
    fn test_non_json_files_skipped() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("notes.txt"), "not a key file").expect("write");
        std::fs::write(dir.path().join("garbage.json"), "{ not json").expect("write");

        let store = XteaKeyStore::load(dir.path());
        assert!(store.is_empty());
    }

    #[test]
    fn test_candidate_priority_order() {
        let mut store = XteaKeyStore::empty();
        store.add(
            "l40_55",
            XteaKeySet {
                game_version: 435,
                key: XteaKey([9, 9, 9, 9]),
            },
        );
        store.add(
            "l40_55",
            XteaKeySet {
                game_version: 462,
                key: XteaKey([1, 2, 3, 4]),
            },
        );

        let candidates = store.candidates("l40_55", Some(462));
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].game_version, 462);
        assert_eq!(candidates[1].game_version, 435);

        // Without a version the load order is preserved.
        let unordered = store.candidates("l40_55", None);
        assert_eq!(unordered[0].game_version, 435);
    }
}
