//! Capability traits a host record framework implements
//!
//! The attachment layer never sees a concrete record type. A host adapter
//! exposes its models through [`Record`] and its persistence layer through
//! [`RecordStore`].

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::value::AttributeValue;

/// A record that can own attachments
pub trait Record: Send + Sync {
    /// Short type name of the record, e.g. `BlogPost`
    fn model_name(&self) -> &str;

    /// Primary-key components in declaration order
    fn primary_key(&self) -> Vec<String>;

    /// Current (possibly unsaved) value of a field
    fn attribute(&self, name: &str) -> Option<&AttributeValue>;

    fn set_attribute(&mut self, name: &str, value: AttributeValue);

    /// Value of a field as last loaded from or written to storage
    fn old_attribute(&self, name: &str) -> Option<&AttributeValue>;

    /// Whether the record has never been persisted
    fn is_new_record(&self) -> bool;

    /// Field rendered as text; missing fields render empty
    fn text(&self, name: &str) -> String {
        self.attribute(name)
            .map(|v| v.as_text().to_string())
            .unwrap_or_default()
    }
}

/// Access to the persisted copy of records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Re-fetch the persisted state of a record by key, ignoring any
    /// in-memory modifications.
    async fn find_persisted(&self, model: &str, key: &[String])
        -> CoreResult<Option<Box<dyn Record>>>;
}
