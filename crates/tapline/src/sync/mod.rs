//! Sync engine - drives selected streams through record emission.

mod transform;

pub use transform::RecordTransformer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::ClientFactory;
use crate::config::{ConfigMap, DEFAULT_START_DATE_KEY};
use crate::core::{
    BookmarkStrategy, Catalog, CatalogEntry, ReplicationMethod, StreamDescriptor,
    StreamRegistry, SyncContext, TapContext,
};
use crate::error::Result;
use crate::output::MessageWriter;
use crate::state::{BookmarkMonitor, State};

/// Custom sync procedure for catalog streams the registry does not know.
pub type SyncOverride =
    Box<dyn Fn(&TapContext<'_>, &Catalog, &mut State, &mut MessageWriter<'_>) -> Result<()>>;

/// Records emitted for one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSummary {
    pub stream: String,
    pub records: u64,
    pub replication_method: ReplicationMethod,
}

/// Result of a sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Streams that were synced, in catalog order.
    pub streams: Vec<StreamSummary>,

    /// Catalog streams that were not synced (deselected or unregistered).
    pub skipped: Vec<String>,
}

impl SyncSummary {
    /// Total records emitted across all streams.
    pub fn total_records(&self) -> u64 {
        self.streams.iter().map(|s| s.records).sum()
    }
}

/// Drives registered streams for a catalog.
pub struct SyncEngine<'t> {
    registry: &'t StreamRegistry,
    clients: &'t ClientFactory,
    start_date_key: String,
}

impl<'t> SyncEngine<'t> {
    pub fn new(registry: &'t StreamRegistry, clients: &'t ClientFactory) -> Self {
        Self {
            registry,
            clients,
            start_date_key: DEFAULT_START_DATE_KEY.to_string(),
        }
    }

    /// Config key that holds the initial bookmark for incremental streams.
    pub fn with_start_date_key(mut self, key: impl Into<String>) -> Self {
        self.start_date_key = key.into();
        self
    }

    /// Sync every selected catalog stream, in catalog order.
    ///
    /// Errors from a stream abort the run; state emitted up to that point
    /// remains valid.
    pub fn sync(
        &self,
        config: &ConfigMap,
        catalog: &Catalog,
        state: &mut State,
        out: &mut MessageWriter<'_>,
    ) -> Result<SyncSummary> {
        let started_at = Utc::now();
        let ctx = TapContext::new(config, self.clients);
        let mut streams = Vec::new();
        let mut skipped = Vec::new();

        for entry in &catalog.streams {
            if !entry.is_selected() {
                info!("Skipping deselected stream: {}", entry.tap_stream_id);
                skipped.push(entry.tap_stream_id.clone());
                continue;
            }

            out.write_state(state)?;
            let replication_key = entry.metadata.replication_key();
            out.write_schema(
                entry.emitted_name(),
                &entry.schema,
                entry.metadata.key_properties(),
                replication_key.clone().map(|key| vec![key]),
            )?;

            let Some(descriptor) = self.registry.lookup(&entry.tap_stream_id) else {
                warn!(
                    "No registered stream for {}; emitted its schema only",
                    entry.tap_stream_id
                );
                skipped.push(entry.tap_stream_id.clone());
                continue;
            };

            streams.push(self.sync_stream(&ctx, entry, descriptor, replication_key, state, out)?);
        }

        out.write_state(state)?;

        let summary = SyncSummary {
            started_at,
            completed_at: Utc::now(),
            streams,
            skipped,
        };
        info!(
            "Sync complete: {} streams, {} records",
            summary.streams.len(),
            summary.total_records()
        );
        Ok(summary)
    }

    fn sync_stream(
        &self,
        ctx: &TapContext<'_>,
        entry: &CatalogEntry,
        descriptor: &StreamDescriptor,
        replication_key: Option<String>,
        state: &mut State,
        out: &mut MessageWriter<'_>,
    ) -> Result<StreamSummary> {
        let stream_id = entry.tap_stream_id.as_str();
        let method = entry.replication_method();

        let bookmark_key = match (method, replication_key) {
            (ReplicationMethod::Incremental, Some(key)) => Some(key),
            (ReplicationMethod::Incremental, None) => {
                warn!(
                    "{}: INCREMENTAL without a replication key, no bookmark will be kept",
                    stream_id
                );
                None
            }
            _ => None,
        };

        if let Some(key) = &bookmark_key {
            self.seed_bookmark(ctx.config(), stream_id, key, state);
        }

        info!("{}: syncing ({})", stream_id, method);

        let stream = descriptor.stream();
        let strategy = stream.attributes().bookmark_strategy;
        let sync_ctx = SyncContext::new(*ctx, stream_id, state.clone(), bookmark_key.clone());
        let transformer = RecordTransformer::new(stream_id, &entry.schema, &entry.metadata);
        let mut monitor = BookmarkMonitor::new();
        let mut count: u64 = 0;

        for item in stream.sync(&sync_ctx)? {
            let mut record = item?;

            if let Some(serializer) = stream.serializer() {
                let encoded = serializer.serialize(&record)?;
                record = serializer.deserialize(&encoded)?;
            }
            let record = transformer.transform(record)?;

            if let Some(key) = &bookmark_key {
                if let Some(value) = record.get(key).filter(|v| !v.is_null()) {
                    monitor.track(value);
                    state.advance_bookmark(stream_id, key, value);
                }
            }

            out.write_record(entry.emitted_name(), record)?;
            count += 1;

            if let (Some(_), BookmarkStrategy::EveryN(n)) = (&bookmark_key, strategy) {
                if n > 0 && count % n as u64 == 0 {
                    out.write_state(state)?;
                }
            }
        }

        if method == ReplicationMethod::Incremental {
            out.write_state(state)?;
        }

        info!("{}: completed ({} records)", stream_id, count);
        if let Some(key) = &bookmark_key {
            if !monitor.is_ascending() {
                warn!(
                    "{}: records were not in ascending {} order ({}); \
                     an interrupted run may skip records",
                    stream_id,
                    key,
                    monitor.summary()
                );
            }
        }

        Ok(StreamSummary {
            stream: stream_id.to_string(),
            records: count,
            replication_method: method,
        })
    }

    fn seed_bookmark(&self, config: &ConfigMap, stream_id: &str, key: &str, state: &mut State) {
        if state.has_bookmark(stream_id, key) {
            debug!("{}: resuming from existing {} bookmark", stream_id, key);
            return;
        }

        match config.get(&self.start_date_key).filter(|v| !v.is_null()) {
            Some(start) => {
                debug!("{}: seeding {} bookmark from {}", stream_id, key, self.start_date_key);
                state.set_bookmark(stream_id, key, start.clone());
            }
            None => warn!(
                "{}: no bookmark and no '{}' in config; the stream starts from the beginning",
                stream_id, self.start_date_key
            ),
        }
    }
}
