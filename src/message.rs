use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::eval::value::Value;
use crate::routing::{Destinations, DESTINATIONS_METADATA_KEY};

/// Field that accumulates per-rule processing errors on the message itself,
/// so searchers can see which transformations did not apply.
pub const FIELD_PROCESSING_ERROR: &str = "processing_error";

/// An open metadata entry: cross-cutting annotations that are not message
/// fields, including the destination routing table.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Value(Value),
    Destinations(Destinations),
}

/// An in-flight log message: a mutable field bag plus an open metadata map.
///
/// During a pipeline run the evaluating worker owns the message exclusively;
/// fields and metadata are the engine's only mutation surface.
#[derive(Debug, Clone)]
pub struct Message {
    id: Uuid,
    timestamp: DateTime<Utc>,
    fields: HashMap<String, Value>,
    streams: HashSet<String>,
    metadata: HashMap<String, MetadataValue>,
    filter_out: bool,
}

impl Message {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            fields,
            streams: HashSet::new(),
            metadata: HashMap::new(),
            filter_out: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    pub fn streams(&self) -> &HashSet<String> {
        &self.streams
    }

    pub fn add_stream(&mut self, stream_id: impl Into<String>) {
        self.streams.insert(stream_id.into());
    }

    /// Marks the message to be dropped after the pipeline run. The message
    /// keeps flowing through the remaining rules; only the output stage
    /// honors the flag.
    pub fn set_filter_out(&mut self, filter_out: bool) {
        self.filter_out = filter_out;
    }

    pub fn filter_out(&self) -> bool {
        self.filter_out
    }

    pub fn metadata(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.metadata.insert(key.into(), value);
    }

    /// The destination routing table, if the message carries one.
    pub fn destinations(&self) -> Option<&Destinations> {
        match self.metadata.get(DESTINATIONS_METADATA_KEY) {
            Some(MetadataValue::Destinations(destinations)) => Some(destinations),
            _ => None,
        }
    }

    /// Destination routing table, created lazily on first access during a
    /// pipeline run.
    pub fn destinations_mut(&mut self) -> &mut Destinations {
        let entry = self
            .metadata
            .entry(DESTINATIONS_METADATA_KEY.to_string())
            .or_insert_with(|| MetadataValue::Destinations(Destinations::new()));
        // the routing key is reserved; a plain value there is replaced
        if !matches!(entry, MetadataValue::Destinations(_)) {
            *entry = MetadataValue::Destinations(Destinations::new());
        }
        match entry {
            MetadataValue::Destinations(destinations) => destinations,
            MetadataValue::Value(_) => unreachable!("destinations key always holds a table"),
        }
    }

    /// Mutable access without creating the table, for no-op semantics.
    pub(crate) fn destinations_mut_if_present(&mut self) -> Option<&mut Destinations> {
        match self.metadata.get_mut(DESTINATIONS_METADATA_KEY) {
            Some(MetadataValue::Destinations(destinations)) => Some(destinations),
            _ => None,
        }
    }

    /// Appends a processing-error note to the message, comma-separated when
    /// earlier rules already failed.
    pub fn append_processing_error(&mut self, error: &str) {
        let combined = match self.fields.get(FIELD_PROCESSING_ERROR) {
            Some(Value::String(existing)) => format!("{},{}", existing, error),
            _ => error.to_string(),
        };
        self.fields
            .insert(FIELD_PROCESSING_ERROR.to_string(), Value::String(combined));
    }
}
