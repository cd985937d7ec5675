//! Core traits implemented by tap authors.
//!
//! This module defines the seams between the engine and tap code:
//!
//! - [`Stream`]: schema, metadata and record production for one stream
//! - [`RecordSerializer`]: optional custom wire round trip for records
//! - [`TapContext`] / [`SyncContext`]: what a stream can see while it runs
//! - [`StreamAttributes`]: key properties and replication settings

use std::rc::Rc;

use serde_json::Value;

use super::catalog::ReplicationMethod;
use super::metadata::Metadata;
use super::schema::empty_schema;
use crate::client::ClientFactory;
use crate::config::ConfigMap;
use crate::error::Result;
use crate::state::State;

/// A single record produced by a stream.
pub type Record = Value;

/// Lazily produced records. Streams may borrow from their context.
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<Record>> + 'a>;

/// When the sync engine emits STATE for an incremental stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookmarkStrategy {
    /// Once, after the stream is drained.
    #[default]
    EndOfSync,
    /// Every `n` records, and again after the stream is drained.
    EveryN(usize),
}

/// Key properties and replication settings declared by a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamAttributes {
    /// Primary key fields.
    pub key_properties: Vec<String>,
    /// Fields usable as replication keys. A single key is a one-element list.
    pub replication_keys: Vec<String>,
    /// Explicit replication method; derived from the keys when absent.
    pub replication_method: Option<ReplicationMethod>,
    /// STATE emission cadence.
    pub bookmark_strategy: BookmarkStrategy,
}

impl StreamAttributes {
    /// Attributes with no keys and default replication.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_properties<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_properties = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn replication_key(mut self, key: impl Into<String>) -> Self {
        self.replication_keys = vec![key.into()];
        self
    }

    pub fn replication_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replication_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn replication_method(mut self, method: ReplicationMethod) -> Self {
        self.replication_method = Some(method);
        self
    }

    pub fn bookmark_strategy(mut self, strategy: BookmarkStrategy) -> Self {
        self.bookmark_strategy = strategy;
        self
    }
}

/// Validated config plus client access, available during discovery and sync.
#[derive(Clone, Copy)]
pub struct TapContext<'a> {
    config: &'a ConfigMap,
    clients: &'a ClientFactory,
}

impl<'a> TapContext<'a> {
    pub fn new(config: &'a ConfigMap, clients: &'a ClientFactory) -> Self {
        Self { config, clients }
    }

    /// The validated configuration.
    pub fn config(&self) -> &'a ConfigMap {
        self.config
    }

    /// A single config value.
    pub fn config_value(&self, key: &str) -> Option<&'a Value> {
        self.config.get(key)
    }

    /// The shared client, constructed from config on first access.
    pub fn client<C: 'static>(&self) -> Result<Rc<C>> {
        self.clients.get::<C>(self.config)
    }
}

/// Context handed to [`Stream::sync`].
///
/// Carries a snapshot of the state taken after bookmark seeding, so a stream
/// can read its starting bookmark while the engine keeps advancing the live
/// state.
pub struct SyncContext<'a> {
    tap: TapContext<'a>,
    stream_id: String,
    state: State,
    replication_key: Option<String>,
}

impl<'a> SyncContext<'a> {
    pub fn new(
        tap: TapContext<'a>,
        stream_id: impl Into<String>,
        state: State,
        replication_key: Option<String>,
    ) -> Self {
        Self {
            tap,
            stream_id: stream_id.into(),
            state,
            replication_key,
        }
    }

    pub fn tap(&self) -> &TapContext<'a> {
        &self.tap
    }

    pub fn config(&self) -> &'a ConfigMap {
        self.tap.config()
    }

    pub fn config_value(&self, key: &str) -> Option<&'a Value> {
        self.tap.config_value(key)
    }

    pub fn client<C: 'static>(&self) -> Result<Rc<C>> {
        self.tap.client::<C>()
    }

    /// Unique id of the stream being synced.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Replication key in effect, if the stream is incremental.
    pub fn replication_key(&self) -> Option<&str> {
        self.replication_key.as_deref()
    }

    /// State as it was when the stream started.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Starting bookmark value for this stream's replication key.
    pub fn bookmark(&self) -> Option<&Value> {
        let key = self.replication_key.as_deref()?;
        self.state.get_bookmark(&self.stream_id, key)
    }
}

/// Custom serialization applied to each record before it is emitted.
///
/// The engine serializes then deserializes every record, so an
/// implementation can normalize representations (e.g. drop precision or
/// rename keys) on the way through.
pub trait RecordSerializer {
    fn serialize(&self, record: &Record) -> Result<String>;
    fn deserialize(&self, data: &str) -> Result<Record>;
}

/// One extractable stream.
///
/// Register implementations with a [`StreamRegistry`](super::registry::StreamRegistry);
/// the registry derives a stream id from the type name unless one is given.
pub trait Stream {
    /// Key properties and replication settings.
    fn attributes(&self) -> StreamAttributes {
        StreamAttributes::default()
    }

    /// JSON Schema for this stream's records.
    fn schema(&self, _ctx: &TapContext<'_>) -> Result<Value> {
        Ok(empty_schema())
    }

    /// Stream-supplied metadata. Defaults are filled in around it.
    fn metadata(&self, _schema: &Value) -> Result<Metadata> {
        Ok(Metadata::new())
    }

    /// Custom serializer for the record round trip, if any.
    fn serializer(&self) -> Option<&dyn RecordSerializer> {
        None
    }

    /// Produce this stream's records.
    fn sync<'a>(&'a self, ctx: &'a SyncContext<'a>) -> Result<RecordIter<'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_replication_key_normalized_to_list() {
        let attrs = StreamAttributes::new().replication_key("updated_at");
        assert_eq!(attrs.replication_keys, vec!["updated_at"]);
        assert_eq!(attrs.bookmark_strategy, BookmarkStrategy::EndOfSync);
    }

    #[test]
    fn test_sync_context_bookmark() {
        let config = ConfigMap::new();
        let clients = ClientFactory::new();
        let mut state = State::new();
        state.set_bookmark("events", "updated_at", json!("2021-03-01"));

        let ctx = SyncContext::new(
            TapContext::new(&config, &clients),
            "events",
            state,
            Some("updated_at".into()),
        );
        assert_eq!(ctx.bookmark(), Some(&json!("2021-03-01")));

        let full = SyncContext::new(
            TapContext::new(&config, &clients),
            "events",
            State::new(),
            None,
        );
        assert!(full.bookmark().is_none());
    }
}
