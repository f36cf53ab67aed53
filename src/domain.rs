use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(u64);

impl ModelId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    pub id: ModelId,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl MetadataRecord {
    pub fn new(id: ModelId, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            id,
            attributes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingResponse {
    pub objects: Vec<ListingObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingObject {
    pub id: ModelId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDetail {
    pub object_name: String,
    #[serde(default)]
    pub object_attribute_values: Vec<AttributeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributeEntry {
    pub attribute_id: i64,
    pub attribute_name: String,
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub values: Option<Value>,
}

impl AttributeEntry {
    pub fn file_content(&self) -> Option<&str> {
        self.value
            .as_ref()
            .and_then(|value| value.get("file_content"))
            .and_then(|value| value.as_str())
    }
}

// Only reached when the key exists, so a JSON null becomes `Some(Value::Null)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn null_value_is_still_present() {
        let entry: AttributeEntry = serde_json::from_value(json!({
            "attribute_id": 5,
            "attribute_name": "notes",
            "value": null
        }))
        .unwrap();
        assert_eq!(entry.value, Some(Value::Null));
        assert!(entry.values.is_none());
    }

    #[test]
    fn null_values_is_still_present() {
        let entry: AttributeEntry = serde_json::from_value(json!({
            "attribute_id": 6,
            "attribute_name": "neurons",
            "values": null
        }))
        .unwrap();
        assert!(entry.value.is_none());
        assert_eq!(entry.values, Some(Value::Null));
    }

    #[test]
    fn record_serializes_attributes_inline() {
        let mut record = MetadataRecord::new(ModelId::new(101), "M1");
        record
            .attributes
            .insert("species".to_string(), json!(["rat"]));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({"title": "M1", "id": 101, "species": ["rat"]})
        );
    }
}
