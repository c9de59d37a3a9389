//! Name hashing and reverse lookup for JS5 entries.
//!
//! Archives that flag their contents as named store a 32-bit signed
//! polynomial hash of each group/file name instead of the name itself.
//! The hash cannot be reversed; known names are recovered through a
//! lookup table shipped alongside the store configuration.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, error};

/// Hash a group or file name.
///
/// `h = char + 31 * h` over the name's code points, wrapping in signed
/// 32-bit arithmetic - the same accumulation the original cache tooling
/// uses, so hashes match the on-disk tables bit for bit.
pub fn hash_name(name: &str) -> i32 {
    name.chars().fold(0i32, |hash, c| {
        (c as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    })
}

/// Reverse lookup table from name hash to known name.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<i32, String>,
}

impl NameTable {
    /// Create an empty table; every lookup falls back to the numeric label.
    pub fn empty() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    /// Load a JSON table mapping hash (as a decimal string key) to name.
    ///
    /// A missing or malformed file is logged and yields an empty table
    /// rather than an error; lookups then degrade to numeric labels.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                error!("Error loading name table {}: {err}", path.display());
                return Self::empty();
            }
        };

        let raw: HashMap<String, String> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(err) => {
                error!("Error parsing name table {}: {err}", path.display());
                return Self::empty();
            }
        };

        let mut names = HashMap::with_capacity(raw.len());
        for (hash, name) in raw {
            match hash.parse::<i32>() {
                Ok(hash) => {
                    names.insert(hash, name);
                }
                Err(_) => debug!("Skipping non-numeric name table key {hash:?}"),
            }
        }

        Self { names }
    }

    /// Record a known name, keyed by its own hash.
    pub fn insert(&mut self, name: &str) {
        self.names.insert(hash_name(name), name.to_string());
    }

    /// The known name for a hash, if any.
    pub fn lookup(&self, hash: i32) -> Option<&str> {
        self.names.get(&hash).map(String::as_str)
    }

    /// A display label for a hash: the known name, or the decimal hash
    /// when the name was never recorded.
    pub fn label(&self, hash: i32) -> String {
        self.lookup(hash)
            .map_or_else(|| hash.to_string(), str::to_string)
    }

    /// Number of known names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no names are known.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_stability() {
        assert_eq!(hash_name("anims"), 92962946);
        assert_eq!(hash_name("midi"), 3351329);
        assert_eq!(hash_name("landscapes"), 1400399128);
    }

    #[test]
    fn test_hash_wraps_signed() {
        // Long enough to overflow 32 bits; the wrapped result is negative.
        assert_eq!(hash_name("title.jpg"), -2136884405);
        assert_eq!(hash_name("l40_55"), -1153472937);
    }

    #[test]
    fn test_hash_empty_name() {
        assert_eq!(hash_name(""), 0);
    }

    #[test]
    fn test_lookup_and_label() {
        let mut table = NameTable::empty();
        table.insert("anims");

        assert_eq!(table.lookup(92962946), Some("anims"));
        assert_eq!(table.label(92962946), "anims");

        assert_eq!(table.lookup(12345), None);
        assert_eq!(table.label(12345), "12345");
        assert_eq!(table.label(-77), "-77");
    }

    #[test]
    fn test_load_from_json() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("name-hashes.json");
        std::fs::write(&path, r#"{"92962946": "anims", "not-a-number": "junk"}"#)
            .expect("write table");

        let table = NameTable::load(&path);
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(92962946), Some("anims"));
    }

    #[test]
    fn test_load_missing_file_degrades() {
        let table = NameTable::load(Path::new("/nonexistent/name-hashes.json"));
        assert!(table.is_empty());
        assert_eq!(table.label(1), "1");
    }
}
