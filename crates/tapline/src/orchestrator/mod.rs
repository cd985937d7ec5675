//! Tap orchestrator - the aggregate that runs discovery and sync.
//!
//! A [`Tap`] is assembled once by the entry point with [`TapBuilder`] and
//! passed by reference; there is no global registry.
//!
//! ```rust,ignore
//! let tap = Tap::builder()
//!     .config_spec(ConfigSpec::required_keys(["api_key", "start_date"]))
//!     .client(|config| ApiClient::connect(config))
//!     .stream(Contacts)
//!     .stream(Invoices)
//!     .build()?;
//!
//! tap.do_sync(Some(config), Some(catalog), None, &mut std::io::stdout())?;
//! ```

use std::io::Write;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::ClientFactory;
use crate::config::{ConfigMap, ConfigSpec, ConfigValidator, DEFAULT_START_DATE_KEY};
use crate::core::{Catalog, Stream, StreamDescriptor, StreamRegistry, TapContext};
use crate::discovery::{DiscoveryEngine, DiscoveryOverride};
use crate::error::{Result, TapError};
use crate::output::MessageWriter;
use crate::state::State;
use crate::sync::{SyncEngine, SyncOverride, SyncSummary};

/// A configured tap.
pub struct Tap {
    validator: ConfigValidator,
    registry: StreamRegistry,
    clients: ClientFactory,
    discovery_override: Option<DiscoveryOverride>,
    sync_override: Option<SyncOverride>,
    requires_catalog: bool,
    start_date_key: String,
}

impl Tap {
    /// Start assembling a tap.
    pub fn builder() -> TapBuilder {
        TapBuilder::new()
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn requires_config(&self) -> bool {
        self.validator.requires_config()
    }

    pub fn requires_catalog(&self) -> bool {
        self.requires_catalog
    }

    /// Validate a raw config value.
    pub fn validate_config(&self, raw_config: Option<Value>) -> Result<ConfigMap> {
        self.validator.validate(raw_config)
    }

    /// Build the catalog without writing it anywhere.
    pub fn discover(&self, raw_config: Option<Value>) -> Result<Catalog> {
        let config = self.validate_config(raw_config)?;
        self.discover_with(&config)
    }

    /// Discovery mode: validate config, build the catalog and write it to `out`.
    pub fn do_discover(&self, raw_config: Option<Value>, out: &mut dyn Write) -> Result<Catalog> {
        info!("Running discovery");
        let catalog = self.discover(raw_config)?;

        out.write_all(catalog.to_json_pretty()?.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()?;

        Ok(catalog)
    }

    /// Sync mode: validate config, then emit SCHEMA/RECORD/STATE for the
    /// selected catalog streams to `out`.
    ///
    /// Catalog streams without a registered definition are handed to the
    /// sync override; the rest go through the sync engine.
    pub fn do_sync(
        &self,
        raw_config: Option<Value>,
        catalog: Option<Catalog>,
        state: Option<State>,
        out: &mut dyn Write,
    ) -> Result<SyncSummary> {
        let config = self.validate_config(raw_config)?;

        let catalog = match catalog {
            Some(catalog) => catalog,
            None if self.requires_catalog => return Err(TapError::MissingCatalog),
            None => {
                info!("No catalog supplied; discovering and selecting every stream");
                let mut catalog = self.discover_with(&config)?;
                for entry in &mut catalog.streams {
                    entry.metadata.set_selected(true);
                }
                catalog
            }
        };

        if self.sync_override.is_none() && self.registry.is_empty() {
            return Err(TapError::SyncModeNotDefined(
                "No sync mode specified; register streams or set one with TapBuilder::sync_mode"
                    .into(),
            ));
        }

        let mut state = state.unwrap_or_default();
        let mut writer = MessageWriter::new(out);
        let ctx = TapContext::new(&config, &self.clients);

        info!(
            "Starting sync of {} catalog streams ({} selected)",
            catalog.len(),
            catalog.selected().count()
        );

        let engine_catalog = match &self.sync_override {
            Some(sync_override) => {
                let (registered, custom): (Vec<_>, Vec<_>) = catalog
                    .streams
                    .into_iter()
                    .partition(|entry| self.registry.contains(&entry.tap_stream_id));

                let overlap: Vec<&str> = registered
                    .iter()
                    .filter(|entry| entry.is_selected())
                    .map(|entry| entry.tap_stream_id.as_str())
                    .collect();
                if !overlap.is_empty() {
                    warn!(
                        "Sync override is set but {} are registered streams; \
                         they are synced by the engine",
                        overlap.join(", ")
                    );
                }

                if !custom.is_empty() {
                    debug!("Handing {} streams to the sync override", custom.len());
                    sync_override(&ctx, &Catalog::from_entries(custom), &mut state, &mut writer)?;
                }
                Catalog::from_entries(registered)
            }
            None => catalog,
        };

        let summary = SyncEngine::new(&self.registry, &self.clients)
            .with_start_date_key(self.start_date_key.as_str())
            .sync(&config, &engine_catalog, &mut state, &mut writer)?;
        writer.flush()?;

        Ok(summary)
    }

    fn discover_with(&self, config: &ConfigMap) -> Result<Catalog> {
        let ctx = TapContext::new(config, &self.clients);
        DiscoveryEngine::new(&self.registry)
            .with_override(self.discovery_override.as_ref())
            .discover(&ctx)
    }
}

/// Builder for [`Tap`].
///
/// Registration errors are kept until [`build`](TapBuilder::build) so the
/// builder chains without intermediate `?`.
pub struct TapBuilder {
    config_spec: ConfigSpec,
    requires_config: Option<bool>,
    requires_catalog: bool,
    start_date_key: String,
    registry: StreamRegistry,
    clients: ClientFactory,
    discovery_override: Option<DiscoveryOverride>,
    sync_override: Option<SyncOverride>,
    expected_streams: Vec<String>,
    error: Option<TapError>,
}

impl Default for TapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TapBuilder {
    pub fn new() -> Self {
        Self {
            config_spec: ConfigSpec::None,
            requires_config: None,
            requires_catalog: true,
            start_date_key: DEFAULT_START_DATE_KEY.to_string(),
            registry: StreamRegistry::new(),
            clients: ClientFactory::new(),
            discovery_override: None,
            sync_override: None,
            expected_streams: Vec::new(),
            error: None,
        }
    }

    pub fn config_spec(mut self, spec: ConfigSpec) -> Self {
        self.config_spec = spec;
        self
    }

    /// Override whether a config must be supplied. Defaults to true unless
    /// the spec is [`ConfigSpec::None`].
    pub fn requires_config(mut self, requires_config: bool) -> Self {
        self.requires_config = Some(requires_config);
        self
    }

    /// Whether sync fails without a catalog. Defaults to true.
    pub fn requires_catalog(mut self, requires_catalog: bool) -> Self {
        self.requires_catalog = requires_catalog;
        self
    }

    /// Config key holding the initial bookmark value. Defaults to `start_date`.
    pub fn start_date_key(mut self, key: impl Into<String>) -> Self {
        self.start_date_key = key.into();
        self
    }

    pub fn discovery_mode<F>(mut self, discover: F) -> Self
    where
        F: Fn(&TapContext<'_>) -> Result<Catalog> + 'static,
    {
        self.discovery_override = Some(Box::new(discover));
        self
    }

    pub fn sync_mode<F>(mut self, sync: F) -> Self
    where
        F: Fn(&TapContext<'_>, &Catalog, &mut State, &mut MessageWriter<'_>) -> Result<()>
            + 'static,
    {
        self.sync_override = Some(Box::new(sync));
        self
    }

    /// Client constructor, called with the validated config on first use.
    pub fn client<C, F>(mut self, ctor: F) -> Self
    where
        C: 'static,
        F: Fn(&ConfigMap) -> Result<C> + 'static,
    {
        self.clients.configure(ctor);
        self
    }

    /// Register a stream under the id derived from its type name.
    pub fn stream<S: Stream + 'static>(self, stream: S) -> Self {
        self.register(StreamDescriptor::new(stream))
    }

    /// Register a stream descriptor.
    pub fn register(mut self, descriptor: StreamDescriptor) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.registry.register(descriptor) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Stream ids that must be registered by the time the tap is built.
    pub fn expect_streams<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_streams.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<Tap> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.registry.require(&self.expected_streams)?;

        let mut validator = ConfigValidator::new(self.config_spec)?;
        if let Some(requires_config) = self.requires_config {
            validator = validator.with_requires_config(requires_config);
        }

        debug!("Built tap with streams: {:?}", self.registry.ids());

        Ok(Tap {
            validator,
            registry: self.registry,
            clients: self.clients,
            discovery_override: self.discovery_override,
            sync_override: self.sync_override,
            requires_catalog: self.requires_catalog,
            start_date_key: self.start_date_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::SELECTED;
    use crate::core::{CatalogEntry, RecordIter, StreamAttributes, SyncContext};
    use crate::output::{parse_messages, Message};
    use serde_json::json;
    use std::rc::Rc;

    struct Widgets;

    struct ApiClient {
        prefix: String,
    }

    impl Stream for Widgets {
        fn attributes(&self) -> StreamAttributes {
            StreamAttributes::new().key_properties(["id"])
        }

        fn schema(&self, _ctx: &TapContext<'_>) -> Result<Value> {
            Ok(json!({"type": "object", "properties": {"id": {"type": "string"}}}))
        }

        fn sync<'a>(&'a self, ctx: &'a SyncContext<'a>) -> Result<RecordIter<'a>> {
            let client: Rc<ApiClient> = ctx.client()?;
            Ok(Box::new((1..=2).map(move |i| {
                Ok(json!({"id": format!("{}-{}", client.prefix, i)}))
            })))
        }
    }

    fn widgets_tap() -> TapBuilder {
        Tap::builder()
            .config_spec(ConfigSpec::required_keys(["prefix"]))
            .client(|config: &ConfigMap| {
                Ok(ApiClient {
                    prefix: config["prefix"].as_str().unwrap_or("w").to_string(),
                })
            })
            .stream(Widgets)
    }

    fn output(buf: Vec<u8>) -> Vec<Message> {
        parse_messages(&String::from_utf8(buf).unwrap()).unwrap()
    }

    #[test]
    fn test_discover_then_sync() {
        let tap = widgets_tap().build().unwrap();
        let config = json!({"prefix": "wg"});

        let mut discovered = Vec::new();
        let mut catalog = tap.do_discover(Some(config.clone()), &mut discovered).unwrap();
        let printed: Catalog = serde_json::from_slice(&discovered).unwrap();
        assert_eq!(printed, catalog);

        catalog.get_mut("widgets").unwrap().metadata.set_selected(true);

        let mut buf = Vec::new();
        let summary = tap
            .do_sync(Some(config), Some(catalog), None, &mut buf)
            .unwrap();
        assert_eq!(summary.total_records(), 2);

        let records: Vec<Value> = output(buf)
            .into_iter()
            .filter_map(|m| match m {
                Message::Record { record, .. } => Some(record),
                _ => None,
            })
            .collect();
        assert_eq!(records, vec![json!({"id": "wg-1"}), json!({"id": "wg-2"})]);
    }

    #[test]
    fn test_missing_catalog() {
        let tap = widgets_tap().build().unwrap();
        let err = tap
            .do_sync(Some(json!({"prefix": "x"})), None, None, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, TapError::MissingCatalog));
    }

    #[test]
    fn test_optional_catalog_selects_everything() {
        let tap = widgets_tap().requires_catalog(false).build().unwrap();
        let summary = tap
            .do_sync(Some(json!({"prefix": "x"})), None, None, &mut Vec::new())
            .unwrap();
        assert_eq!(summary.total_records(), 2);
    }

    #[test]
    fn test_config_validated_before_catalog() {
        let tap = widgets_tap().build().unwrap();
        let err = tap.do_sync(None, None, None, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, TapError::ConfigValidation(_)));
    }

    #[test]
    fn test_sync_mode_not_defined() {
        let tap = Tap::builder().requires_catalog(false).build().unwrap();
        let err = tap
            .do_sync(None, Some(Catalog::new()), None, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, TapError::SyncModeNotDefined(_)));
    }

    #[test]
    fn test_sync_override_gets_unregistered_streams() {
        let tap = widgets_tap()
            .sync_mode(|_ctx, catalog, state, out| {
                for entry in &catalog.streams {
                    out.write_record(&entry.tap_stream_id, json!({"custom": true}))?;
                    state.set_bookmark(&entry.tap_stream_id, "cursor", json!("abc"));
                }
                Ok(())
            })
            .build()
            .unwrap();

        let mut custom = CatalogEntry::new("legacy", "legacy", json!({}));
        custom.metadata.set(Vec::new(), SELECTED, json!(true));
        let mut widgets = CatalogEntry::new("widgets", "widgets", json!({}));
        widgets.metadata.set_selected(true);

        let mut buf = Vec::new();
        tap.do_sync(
            Some(json!({"prefix": "p"})),
            Some(Catalog::from_entries(vec![custom, widgets])),
            None,
            &mut buf,
        )
        .unwrap();

        let messages = output(buf);
        let streams: Vec<&str> = messages
            .iter()
            .filter_map(|m| match m {
                Message::Record { stream, .. } => Some(stream.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(streams, vec!["legacy", "widgets", "widgets"]);

        match messages.last() {
            Some(Message::State { value }) => {
                assert_eq!(value["bookmarks"]["legacy"]["cursor"], "abc")
            }
            other => panic!("expected STATE, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_registration_surfaces_at_build() {
        let err = widgets_tap().stream(Widgets).build().err().unwrap();
        assert!(matches!(err, TapError::DuplicateStream(_)));
    }

    #[test]
    fn test_expected_streams() {
        assert!(widgets_tap().expect_streams(["widgets"]).build().is_ok());

        let err = widgets_tap()
            .expect_streams(["widgets", "gadgets"])
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, TapError::StreamsNotFound(ref ids) if ids == &["gadgets"]));
    }

    #[test]
    fn test_requires_config_flags() {
        assert!(widgets_tap().build().unwrap().requires_config());
        assert!(!Tap::builder().build().unwrap().requires_config());
        assert!(!widgets_tap().requires_config(false).build().unwrap().requires_config());
    }
}
