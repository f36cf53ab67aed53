use std::collections::BTreeSet;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::checkpoint::SharedCheckpoint;
use crate::config::ResolvedConfig;
use crate::domain::{AttributeEntry, MetadataRecord, ModelDetail, ModelId};
use crate::error::HarvestError;
use crate::modeldb::ModelDbClient;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::retry::RetryPolicy;
use crate::store::Store;

const RESERVED_KEYS: [&str; 2] = ["title", "id"];

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub archive_attribute_id: i64,
    pub ignored_attributes: BTreeSet<String>,
    pub retry: RetryPolicy,
}

impl HarvestSettings {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            archive_attribute_id: config.archive_attribute_id,
            ignored_attributes: config.ignored_attributes.iter().cloned().collect(),
            retry: RetryPolicy {
                matcher: config.transient_error.clone(),
                delay: config.retry_delay,
                max_retries: config.max_retries,
            },
        }
    }
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self::from_config(&ResolvedConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestSummary {
    pub listed: usize,
    pub skipped: usize,
    pub harvested: usize,
    pub archives_written: usize,
    pub link_only: usize,
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestedModel {
    pub record: MetadataRecord,
    pub archive_written: bool,
    pub retries: u32,
}

pub struct Harvester<C: ModelDbClient> {
    client: C,
    store: Store,
    settings: HarvestSettings,
}

impl<C: ModelDbClient> Harvester<C> {
    pub fn new(client: C, store: Store, settings: HarvestSettings) -> Self {
        Self {
            client,
            store,
            settings,
        }
    }

    pub fn list_models(&self) -> Result<Vec<ModelId>, HarvestError> {
        let ids = self.client.list_models()?;
        info!(count = ids.len(), "fetched model listing");
        Ok(ids)
    }

    pub fn harvest(
        &self,
        ids: &[ModelId],
        checkpoint: &SharedCheckpoint,
        sink: &dyn ProgressSink,
    ) -> Result<HarvestSummary, HarvestError> {
        self.store.ensure_archive_dir()?;

        let mut summary = HarvestSummary {
            listed: ids.len(),
            ..HarvestSummary::default()
        };
        sink.event(ProgressEvent::Started { total: ids.len() });

        for &id in ids {
            if checkpoint.contains(id) {
                summary.skipped += 1;
                sink.event(ProgressEvent::Skipped { id });
                continue;
            }

            let harvested = self.harvest_one(id, sink)?;
            summary.harvested += 1;
            summary.retries += harvested.retries;
            if harvested.archive_written {
                summary.archives_written += 1;
            } else {
                summary.link_only += 1;
                debug!(model_id = %id, "model has no archive attribute");
            }
            checkpoint.insert(harvested.record);
            sink.event(ProgressEvent::Harvested {
                id,
                archive: harvested.archive_written,
            });
        }

        sink.event(ProgressEvent::Finished);
        info!(
            listed = summary.listed,
            skipped = summary.skipped,
            harvested = summary.harvested,
            archives = summary.archives_written,
            link_only = summary.link_only,
            retries = summary.retries,
            "harvest complete"
        );
        Ok(summary)
    }

    pub fn harvest_one(
        &self,
        id: ModelId,
        sink: &dyn ProgressSink,
    ) -> Result<HarvestedModel, HarvestError> {
        let delay = self.settings.retry.delay;
        let settled = self.settings.retry.fetch(
            id,
            || self.client.fetch_detail(id),
            |attempt| sink.event(ProgressEvent::Retrying { id, attempt, delay }),
        )?;

        let detail: ModelDetail =
            serde_json::from_value(settled.body).map_err(|err| HarvestError::Decode {
                context: format!("model {id}"),
                message: err.to_string(),
            })?;

        let (record, archive_written) = self.build_record(id, detail)?;
        Ok(HarvestedModel {
            record,
            archive_written,
            retries: settled.retries,
        })
    }

    fn build_record(
        &self,
        id: ModelId,
        detail: ModelDetail,
    ) -> Result<(MetadataRecord, bool), HarvestError> {
        let mut record = MetadataRecord::new(id, detail.object_name);
        let mut archive_written = false;

        for entry in detail.object_attribute_values {
            if entry.attribute_id == self.settings.archive_attribute_id {
                let content = decode_archive(id, &entry)?;
                let path = self.store.write_archive(id, &content)?;
                debug!(model_id = %id, path = %path, bytes = content.len(), "archive written");
                archive_written = true;
                continue;
            }

            if self.settings.ignored_attributes.contains(&entry.attribute_name) {
                continue;
            }
            if RESERVED_KEYS.contains(&entry.attribute_name.as_str()) {
                warn!(
                    model_id = %id,
                    attribute = %entry.attribute_name,
                    "skipping attribute that would overwrite a record key"
                );
                continue;
            }

            let name = entry.attribute_name.clone();
            let values = attribute_values(id, entry)?;
            record.attributes.insert(name, values);
        }

        Ok((record, archive_written))
    }
}

pub fn attribute_values(id: ModelId, entry: AttributeEntry) -> Result<Value, HarvestError> {
    match (entry.value, entry.values) {
        (Some(value), _) => Ok(Value::Array(vec![value])),
        (None, Some(values)) => Ok(values),
        (None, None) => Err(HarvestError::MissingAttributeValue {
            id,
            attribute: entry.attribute_name,
        }),
    }
}

pub fn decode_archive(id: ModelId, entry: &AttributeEntry) -> Result<Vec<u8>, HarvestError> {
    let content = entry
        .file_content()
        .ok_or_else(|| HarvestError::MissingArchiveContent { id })?;
    STANDARD
        .decode(content)
        .map_err(|err| HarvestError::ArchiveDecode {
            id,
            message: err.to_string(),
        })
}
