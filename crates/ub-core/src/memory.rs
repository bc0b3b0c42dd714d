//! In-memory record host, used by tests and the CLI

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::traits::{Record, RecordStore};
use crate::value::AttributeValue;

/// A record backed by a field map
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    model: String,
    key_fields: Vec<String>,
    attributes: HashMap<String, AttributeValue>,
    old_attributes: HashMap<String, AttributeValue>,
    new_record: bool,
}

impl MemoryRecord {
    /// New, unsaved record whose primary key is the `id` field
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_key(model, &["id"])
    }

    /// New, unsaved record with a (possibly composite) primary key
    pub fn with_key(model: impl Into<String>, key_fields: &[&str]) -> Self {
        Self {
            model: model.into(),
            key_fields: key_fields.iter().map(|f| f.to_string()).collect(),
            attributes: HashMap::new(),
            old_attributes: HashMap::new(),
            new_record: true,
        }
    }

    pub fn set(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Build a record from a JSON object; scalar fields only
    pub fn from_json(model: impl Into<String>, key_fields: &[&str], json: &serde_json::Value) -> Self {
        let mut record = Self::with_key(model, key_fields);
        if let Some(fields) = json.as_object() {
            for (name, value) in fields {
                record
                    .attributes
                    .insert(name.clone(), AttributeValue::from_json(value));
            }
        }
        record
    }

    /// Snapshot current values as the persisted state
    pub fn mark_persisted(&mut self) {
        self.old_attributes = self.attributes.clone();
        self.new_record = false;
    }

    /// Same record as loaded fresh from storage
    pub fn persisted(mut self) -> Self {
        self.mark_persisted();
        self
    }

    fn store_key(&self) -> String {
        format!("{}#{}", self.model, self.primary_key().join(","))
    }
}

impl Record for MemoryRecord {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn primary_key(&self) -> Vec<String> {
        self.key_fields.iter().map(|f| self.text(f)).collect()
    }

    fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) {
        self.attributes.insert(name.to_string(), value);
    }

    fn old_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.old_attributes.get(name)
    }

    fn is_new_record(&self) -> bool {
        self.new_record
    }
}

/// In-memory record table
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, MemoryRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a record, marking it as saved
    pub async fn save(&self, record: &mut MemoryRecord) {
        record.mark_persisted();
        let mut records = self.records.write().await;
        records.insert(record.store_key(), record.clone());
    }

    /// Remove a persisted record; fails when it was never saved
    pub async fn delete(&self, record: &MemoryRecord) -> CoreResult<()> {
        let mut records = self.records.write().await;
        match records.remove(&record.store_key()) {
            Some(_) => Ok(()),
            None => Err(CoreError::not_found(&record.model, &record.primary_key())),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_persisted(
        &self,
        model: &str,
        key: &[String],
    ) -> CoreResult<Option<Box<dyn Record>>> {
        let records = self.records.read().await;
        let found = records
            .get(&format!("{}#{}", model, key.join(",")))
            .cloned()
            .map(|r| Box::new(r) as Box<dyn Record>);
        Ok(found)
    }
}
