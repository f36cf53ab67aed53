use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{error, info, warn};

use crate::domain::{MetadataRecord, ModelId};
use crate::error::HarvestError;
use crate::store::write_bytes_atomic;

pub type MetadataStore = BTreeMap<ModelId, MetadataRecord>;

#[derive(Debug)]
pub struct Checkpoint {
    path: Utf8PathBuf,
    records: MetadataStore,
    saved: bool,
}

impl Checkpoint {
    pub fn load(path: &Utf8Path) -> Result<Self, HarvestError> {
        let records = match fs::read(path.as_std_path()) {
            Ok(content) => parse_records(path, &content)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => MetadataStore::new(),
            Err(err) => {
                return Err(HarvestError::CheckpointRead {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                });
            }
        };

        for (key, record) in &records {
            if *key != record.id {
                warn!(key = %key, record_id = %record.id, "checkpoint record id differs from its key");
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            records,
            saved: false,
        })
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn get(&self, id: ModelId) -> Option<&MetadataRecord> {
        self.records.get(&id)
    }

    pub fn insert(&mut self, record: MetadataRecord) {
        self.records.insert(record.id, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub fn save(&self) -> Result<(), HarvestError> {
        let content = to_pretty_json(&self.records)?;
        write_bytes_atomic(&self.path, &content)
    }
}

fn parse_records(path: &Utf8Path, content: &[u8]) -> Result<MetadataStore, HarvestError> {
    serde_json::from_slice(content).map_err(|err| HarvestError::CheckpointParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, HarvestError> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut serializer)
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    Ok(buffer)
}

#[derive(Debug, Clone)]
pub struct SharedCheckpoint {
    inner: Arc<Mutex<Checkpoint>>,
}

impl SharedCheckpoint {
    pub fn new(checkpoint: Checkpoint) -> Self {
        Self {
            inner: Arc::new(Mutex::new(checkpoint)),
        }
    }

    pub fn load(path: &Utf8Path) -> Result<Self, HarvestError> {
        Checkpoint::load(path).map(Self::new)
    }

    // Poisoning is ignored so a panic on the harvest thread cannot block the final save.
    pub fn lock(&self) -> MutexGuard<'_, Checkpoint> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.lock().contains(id)
    }

    pub fn insert(&self, record: MetadataRecord) {
        self.lock().insert(record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn flush(&self) -> Result<bool, HarvestError> {
        let mut checkpoint = self.lock();
        if checkpoint.saved {
            return Ok(false);
        }
        checkpoint.saved = true;
        checkpoint.save()?;
        info!(
            path = %checkpoint.path,
            records = checkpoint.len(),
            "checkpoint saved"
        );
        Ok(true)
    }
}

pub struct CheckpointGuard {
    checkpoint: SharedCheckpoint,
}

impl CheckpointGuard {
    pub fn arm(checkpoint: SharedCheckpoint) -> Self {
        Self { checkpoint }
    }

    pub fn finish(self) -> Result<(), HarvestError> {
        self.checkpoint.flush().map(|_| ())
    }
}

impl Drop for CheckpointGuard {
    fn drop(&mut self) {
        if let Err(err) = self.checkpoint.flush() {
            error!(error = %err, "failed to save checkpoint");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn indentation_is_four_spaces() {
        let mut records = MetadataStore::new();
        records.insert(ModelId::new(1), MetadataRecord::new(ModelId::new(1), "A"));
        let text = String::from_utf8(to_pretty_json(&records).unwrap()).unwrap();
        assert!(text.contains("\n    \"1\": {\n        \"title\": \"A\""));
    }

    #[test]
    fn string_keys_become_ids() {
        let content = serde_json::to_vec(&json!({
            "42": {"title": "B", "id": 42, "species": ["mouse"]}
        }))
        .unwrap();
        let records = parse_records(Utf8Path::new("x.json"), &content).unwrap();
        let record = &records[&ModelId::new(42)];
        assert_eq!(record.title, "B");
        assert_eq!(record.attributes["species"], json!(["mouse"]));
    }
}
