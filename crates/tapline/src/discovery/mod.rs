//! Discovery engine - assembles the catalog.
//!
//! The catalog is the override fragment (if the tap supplies a discovery
//! override) followed by one entry per registered stream. Every entry gets
//! default metadata from [`MetadataBuilder`].

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::core::metadata::VALID_REPLICATION_KEYS;
use crate::core::{
    Catalog, CatalogEntry, Metadata, MetadataBuilder, StreamAttributes, StreamDescriptor,
    StreamRegistry, TapContext,
};
use crate::error::Result;

/// Custom discovery for streams not backed by the registry.
pub type DiscoveryOverride = Box<dyn Fn(&TapContext<'_>) -> Result<Catalog>>;

/// Builds catalogs from the registry and an optional override.
pub struct DiscoveryEngine<'t> {
    registry: &'t StreamRegistry,
    discovery_override: Option<&'t DiscoveryOverride>,
}

impl<'t> DiscoveryEngine<'t> {
    pub fn new(registry: &'t StreamRegistry) -> Self {
        Self {
            registry,
            discovery_override: None,
        }
    }

    pub fn with_override(mut self, discovery_override: Option<&'t DiscoveryOverride>) -> Self {
        self.discovery_override = discovery_override;
        self
    }

    /// Build the catalog.
    ///
    /// When an override entry and a registered stream share a
    /// `tap_stream_id`, the registered stream wins.
    pub fn discover(&self, ctx: &TapContext<'_>) -> Result<Catalog> {
        let mut registry_entries = Vec::with_capacity(self.registry.len());
        for descriptor in self.registry.all() {
            registry_entries.push(self.describe(ctx, descriptor)?);
        }

        let mut streams = Vec::new();
        if let Some(discover) = self.discovery_override {
            let fragment = discover(ctx)?;
            debug!("Discovery override produced {} streams", fragment.len());

            let mut seen = HashSet::new();
            for mut entry in fragment.streams {
                if self.registry.contains(&entry.tap_stream_id) {
                    warn!(
                        "Discovered stream {} is also registered; using the registered definition",
                        entry.tap_stream_id
                    );
                    continue;
                }
                if !seen.insert(entry.tap_stream_id.clone()) {
                    warn!(
                        "Discovery override returned {} more than once; keeping the first",
                        entry.tap_stream_id
                    );
                    continue;
                }

                let attributes = attributes_from_metadata(&entry.metadata);
                entry.metadata =
                    MetadataBuilder::build_defaults(&entry.schema, &entry.metadata, &attributes);
                streams.push(entry);
            }
        }
        streams.extend(registry_entries);

        if streams.is_empty() {
            warn!("Discovery found no streams; the catalog is empty");
        } else {
            info!("Discovered {} streams", streams.len());
        }

        Ok(Catalog::from_entries(streams))
    }

    fn describe(
        &self,
        ctx: &TapContext<'_>,
        descriptor: &StreamDescriptor,
    ) -> Result<CatalogEntry> {
        let stream = descriptor.stream();
        let schema = stream.schema(ctx)?;
        let supplied = stream.metadata(&schema)?;
        let metadata = MetadataBuilder::build_defaults(&schema, &supplied, &stream.attributes());

        debug!(
            "{}: {} metadata breadcrumbs",
            descriptor.unique_name(),
            metadata.breadcrumbs().count()
        );

        Ok(CatalogEntry {
            tap_stream_id: descriptor.unique_name().to_string(),
            stream: descriptor.display_name().to_string(),
            stream_alias: descriptor.alias().map(str::to_string),
            schema,
            metadata,
        })
    }
}

/// Attributes implied by metadata an override already carries.
fn attributes_from_metadata(metadata: &Metadata) -> StreamAttributes {
    let valid_keys: Vec<String> = metadata
        .stream_value(VALID_REPLICATION_KEYS)
        .and_then(|v| v.as_array())
        .map(|keys| {
            keys.iter()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut attributes = StreamAttributes::new()
        .key_properties(metadata.key_properties())
        .replication_keys(valid_keys);
    attributes.replication_method = metadata.replication_method();
    attributes
}
