//! Makerspace records keyed by school name, persisted as one pretty-printed JSON object.
//!
//! Older files stored each school as a list of records. Those entries are
//! migrated on load (first element kept) and the file is rewritten. Every
//! known school always has an entry; missing ones are backfilled with the
//! empty record.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SPACE_FILE_NAME: &str = "makerspaces.json";

/// Editable makerspace metadata for one school. Empty fields are omitted on disk,
/// so the empty record is stored as `{}`. Keys written by other tools ride along in
/// `extra` until the record is replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub space_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contact: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub website: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// A school has a makerspace exactly when `space_name` is non-empty.
    pub fn has_space(&self) -> bool {
        !self.space_name.is_empty()
    }
}

/// Raw form input as typed by the operator; `tools` is a comma-separated list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordInput {
    #[serde(default)]
    pub space_name: String,
    #[serde(default)]
    pub tools: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
}

impl RecordInput {
    pub fn normalize(&self) -> Record {
        Record {
            space_name: self.space_name.trim().to_string(),
            tools: self
                .tools
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            contact: self.contact.trim().to_string(),
            email: self.email.trim().to_string(),
            website: self.website.trim().to_string(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write record store '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize record store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Shapes a stored value may take. Only exists while decoding the file.
#[derive(Debug)]
enum StoredEntry {
    LegacySequence(Vec<Value>),
    CurrentRecord(Map<String, Value>),
    Unrecognized(Value),
}

impl From<Value> for StoredEntry {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::LegacySequence(items),
            Value::Object(map) => Self::CurrentRecord(map),
            other => Self::Unrecognized(other),
        }
    }
}

impl StoredEntry {
    /// Returns the normalized record and whether the stored shape had to change.
    fn normalize(self, key: &str) -> (Record, bool) {
        match self {
            Self::CurrentRecord(map) => (decode_record(key, map), false),
            Self::LegacySequence(items) => {
                tracing::debug!(school = key, entries = items.len(), "migrating legacy record list");
                let record = match items.into_iter().next() {
                    Some(Value::Object(map)) => decode_record(key, map),
                    _ => Record::default(),
                };
                (record, true)
            }
            Self::Unrecognized(value) => {
                tracing::warn!(school = key, value = %value, "unrecognized record shape, resetting");
                (Record::default(), true)
            }
        }
    }
}

/// Field-by-field decode. A field of the wrong type reads as empty without
/// touching its siblings; unknown keys are kept in `extra`.
fn decode_record(key: &str, mut map: Map<String, Value>) -> Record {
    let mut ignored = Vec::new();
    let mut text = |map: &mut Map<String, Value>, field: &'static str| match map.remove(field) {
        Some(Value::String(value)) => value,
        None => String::new(),
        Some(_) => {
            ignored.push(field);
            String::new()
        }
    };
    let space_name = text(&mut map, "space_name");
    let contact = text(&mut map, "contact");
    let email = text(&mut map, "email");
    let website = text(&mut map, "website");
    let tools = match map.remove("tools") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(tool) => Some(tool),
                _ => None,
            })
            .collect(),
        None => Vec::new(),
        Some(_) => {
            ignored.push("tools");
            Vec::new()
        }
    };
    if !ignored.is_empty() {
        tracing::warn!(school = key, fields = ?ignored, "ignoring record fields with unexpected types");
    }
    Record {
        space_name,
        tools,
        contact,
        email,
        website,
        extra: map,
    }
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    records: BTreeMap<String, Record>,
}

impl RecordStore {
    /// Load the store at `path`, migrate legacy entries and backfill every known name.
    /// A missing or unparseable file counts as empty. Unknown keys are preserved.
    /// The file is rewritten only if something changed.
    pub fn load<I, S>(path: impl Into<PathBuf>, known_names: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = path.into();
        let (raw, mut dirty) = read_raw(&path);

        let mut records = BTreeMap::new();
        for (key, value) in raw {
            let (record, repaired) = StoredEntry::from(value).normalize(&key);
            dirty |= repaired;
            records.insert(key, record);
        }

        let mut backfilled = 0usize;
        for name in known_names {
            let name = name.as_ref();
            if !records.contains_key(name) {
                records.insert(name.to_string(), Record::default());
                backfilled += 1;
            }
        }
        dirty |= backfilled > 0;

        let store = Self { path, records };
        if dirty {
            tracing::info!(
                path = %store.path.display(),
                entries = store.records.len(),
                backfilled,
                "rewriting record store after migration"
            );
            store.persist()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }

    pub fn records(&self) -> &BTreeMap<String, Record> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn presence_count(&self) -> usize {
        self.records.values().filter(|r| r.has_space()).count()
    }

    /// Replace the whole entry for `name` and rewrite the file.
    pub fn save(&mut self, name: &str, record: Record) -> Result<(), StoreError> {
        let previous = self.records.insert(name.to_string(), record);
        if let Err(err) = self.persist() {
            match previous {
                Some(previous) => self.records.insert(name.to_string(), previous),
                None => self.records.remove(name),
            };
            return Err(err);
        }
        tracing::info!(school = name, "record saved");
        Ok(())
    }

    /// Reset the entry for `name` to the empty record. The key stays.
    pub fn clear(&mut self, name: &str) -> Result<(), StoreError> {
        self.save(name, Record::default())
    }

    /// Last write time of the backing file in nanoseconds since the epoch, 0 if absent.
    pub fn modified_at(&self) -> u128 {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let serialized = serde_json::to_string_pretty(&self.records)?;
        fs::write(&self.path, serialized).map_err(io_err)
    }
}

/// Read the raw JSON object. The flag is set when the file existed but could not be used.
fn read_raw(path: &Path) -> (Map<String, Value>, bool) {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return (Map::new(), false),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "record store unreadable, starting empty");
            return (Map::new(), true);
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => (map, false),
        Ok(_) | Err(_) => {
            tracing::warn!(path = %path.display(), "record store is corrupt, rebuilding");
            (Map::new(), true)
        }
    }
}
