use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::BrokerError;

/// Metadata stamped on a message by the provider that stored it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Shard or partition id assigned by the provider.
    pub shard_id: String,
    /// Epoch milliseconds at which the provider accepted the message.
    pub published_timestamp: u64,
    /// Provider-assigned sequence number, unique within the shard.
    pub sequence_number: String,
    /// Name of the transport technology that stored the message.
    pub technology: String,
}

/// An immutable message in a topic stream.
///
/// Built with [`Message::builder`]; the identifier and provider metadata
/// are assigned at publish time if absent, so a message read back from a
/// topic always carries both. The payload is a map of named binary blobs
/// whose insertion order is preserved for iteration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    ulid: Option<Ulid>,
    external_id: String,
    client_source_id: Option<String>,
    provider: Option<ProviderMetadata>,
    ordering_group: Option<String>,
    sequence_number: u64,
    attributes: HashMap<String, String>,
    data: Vec<(String, Vec<u8>)>,
}

impl Message {
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    /// The sortable identifier, present on every message read from a topic.
    pub fn ulid(&self) -> Option<Ulid> {
        self.ulid
    }

    /// The caller-supplied external identifier. Need not be sortable or
    /// unique.
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn client_source_id(&self) -> Option<&str> {
        self.client_source_id.as_deref()
    }

    pub fn provider(&self) -> Option<&ProviderMetadata> {
        self.provider.as_ref()
    }

    /// Caller-defined grouping for best-effort FIFO reconstruction across
    /// non-ordered transports.
    pub fn ordering_group(&self) -> Option<&str> {
        self.ordering_group.as_deref()
    }

    /// Sequence number within the ordering group; 0 means ordering is
    /// already guaranteed by the transport.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Epoch milliseconds at which the client produced the message, derived
    /// from the identifier.
    pub fn client_published_timestamp(&self) -> Option<u64> {
        self.ulid.map(|u| u.timestamp_ms())
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Payload keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.iter().map(|(key, _)| key.as_str())
    }

    /// The payload blob stored under the given key.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_slice())
    }

    pub fn data_count(&self) -> usize {
        self.data.len()
    }

    /// Decode the payload blob under `key` from bitcode.
    pub fn decode_data<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, bitcode::Error> {
        match self.get(key) {
            Some(bytes) => bitcode::deserialize(bytes).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn set_ulid(&mut self, ulid: Ulid) {
        self.ulid = Some(ulid);
    }

    pub(crate) fn set_provider(&mut self, provider: ProviderMetadata) {
        self.provider = Some(provider);
    }
}

/// Builder for [`Message`]. The external id is required; everything else
/// is optional.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    ulid: Option<Ulid>,
    external_id: Option<String>,
    client_source_id: Option<String>,
    provider: Option<ProviderMetadata>,
    ordering_group: Option<String>,
    sequence_number: u64,
    attributes: HashMap<String, String>,
    data: Vec<(String, Vec<u8>)>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply an explicit identifier instead of having one assigned at
    /// publish time.
    pub fn ulid(mut self, ulid: Ulid) -> Self {
        self.ulid = Some(ulid);
        self
    }

    pub fn external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn client_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.client_source_id = Some(source_id.into());
        self
    }

    pub fn provider(mut self, provider: ProviderMetadata) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn ordering_group(mut self, group: impl Into<String>) -> Self {
        self.ordering_group = Some(group.into());
        self
    }

    pub fn sequence_number(mut self, sequence_number: u64) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add a payload blob. Keys must be unique; duplicates fail `build`.
    pub fn data(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.data.push((key.into(), value));
        self
    }

    /// Add a payload blob encoded with bitcode.
    pub fn encoded_data<T: Serialize>(
        self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, bitcode::Error> {
        let bytes = bitcode::serialize(value)?;
        Ok(self.data(key, bytes))
    }

    pub fn build(self) -> Result<Message, BrokerError> {
        let external_id = match self.external_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(BrokerError::InvalidMessage(
                    "external id is required".to_string(),
                ))
            }
        };
        for (i, (key, _)) in self.data.iter().enumerate() {
            if self.data[..i].iter().any(|(k, _)| k == key) {
                return Err(BrokerError::InvalidMessage(format!(
                    "duplicate payload key: {}",
                    key
                )));
            }
        }
        Ok(Message {
            ulid: self.ulid,
            external_id,
            client_source_id: self.client_source_id,
            provider: self.provider,
            ordering_group: self.ordering_group,
            sequence_number: self.sequence_number,
            attributes: self.attributes,
            data: self.data,
        })
    }
}
