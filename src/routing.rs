use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::message::Message;

/// Metadata key under which a message's destination routing table lives.
pub const DESTINATIONS_METADATA_KEY: &str = "destinations";

/// Per-message routing table: destination-type name (e.g. "indexer") to the
/// set of stream ids still eligible for that destination.
///
/// Rule actions narrow this table to suppress specific outputs without
/// removing the message from the pipeline; the output stage treats a stream
/// id absent from a destination's set as "do not deliver there".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Destinations {
    entries: HashMap<String, HashSet<String>>,
}

impl Destinations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, destination_type: impl Into<String>, stream_id: impl Into<String>) {
        self.entries
            .entry(destination_type.into())
            .or_default()
            .insert(stream_id.into());
    }

    /// Removes a stream from a destination's eligible set. Returns whether
    /// the stream was present.
    pub fn remove(&mut self, destination_type: &str, stream_id: &str) -> bool {
        self.entries
            .get_mut(destination_type)
            .map(|streams| streams.remove(stream_id))
            .unwrap_or(false)
    }

    pub fn streams_for(&self, destination_type: &str) -> Option<&HashSet<String>> {
        self.entries.get(destination_type)
    }

    pub fn is_eligible(&self, destination_type: &str, stream_id: &str) -> bool {
        self.streams_for(destination_type)
            .map(|streams| streams.contains(stream_id))
            .unwrap_or(false)
    }

    pub fn destination_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Removes `stream_id` from `destination_type`'s eligible set on the given
/// message. A message without routing metadata was never eligible, so the
/// call is a no-op there.
pub fn remove_destination(message: &mut Message, destination_type: &str, stream_id: &str) {
    match message.destinations_mut_if_present() {
        Some(destinations) => {
            let removed = destinations.remove(destination_type, stream_id);
            trace!(
                destination_type,
                stream_id,
                removed,
                "narrowed message destinations"
            );
        }
        None => trace!(
            destination_type,
            stream_id,
            "no destination metadata, nothing to remove"
        ),
    }
}
