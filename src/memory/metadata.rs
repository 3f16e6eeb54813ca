use std::collections::HashMap;

use parking_lot::Mutex;

use crate::api::MetadataClient;

/// Per-topic metadata store. One instance per topic, shared by every
/// caller of [`Topic::metadata`](crate::api::Topic::metadata), so writes
/// are visible across handles.
pub struct MemoryMetadataClient {
    topic: String,
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryMetadataClient {
    pub(crate) fn new(topic: impl Into<String>) -> Self {
        MemoryMetadataClient {
            topic: topic.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl MetadataClient for MemoryMetadataClient {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: Vec<u8>) {
        self.entries.lock().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
