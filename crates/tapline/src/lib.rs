//! # tapline
//!
//! Engine for writing Singer taps: programs that extract data from a source
//! and print SCHEMA, RECORD and STATE messages for a downstream loader.
//!
//! Tap code implements [`Stream`] for each stream it can extract and
//! assembles a [`Tap`]. The engine takes care of:
//!
//! - **Config validation** from a declarative [`ConfigSpec`]
//! - **Discovery**: building a catalog with default Singer metadata
//! - **Sync**: selection filtering, bookmark seeding and advancement,
//!   record transforms and message emission
//! - **Client sharing**: one lazily constructed client per run
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tapline::{ConfigSpec, RecordIter, Result, Stream, StreamAttributes, SyncContext, Tap};
//!
//! struct Countries;
//!
//! impl Stream for Countries {
//!     fn attributes(&self) -> StreamAttributes {
//!         StreamAttributes::new().key_properties(["code"])
//!     }
//!
//!     fn sync<'a>(&'a self, _ctx: &'a SyncContext<'a>) -> Result<RecordIter<'a>> {
//!         Ok(Box::new(std::iter::once(Ok(json!({"code": "NZ"})))))
//!     }
//! }
//!
//! fn main() -> tapline::Result<()> {
//!     let tap = Tap::builder()
//!         .config_spec(ConfigSpec::None)
//!         .stream(Countries)
//!         .build()?;
//!     tap.do_discover(None, &mut std::io::stdout())?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod state;
pub mod sync;

// Re-exports for convenient access
pub use client::ClientFactory;
pub use config::{ConfigMap, ConfigSchema, ConfigSpec, ConfigValidator, FnSchema, TypedSchema};
pub use crate::core::{
    BookmarkStrategy, Catalog, CatalogEntry, Metadata, MetadataBuilder, Record, RecordIter,
    RecordSerializer, ReplicationMethod, SchemaSource, Stream, StreamAttributes,
    StreamDescriptor, StreamRegistry, SyncContext, TapContext,
};
pub use discovery::{DiscoveryEngine, DiscoveryOverride};
pub use error::{Result, TapError};
pub use orchestrator::{Tap, TapBuilder};
pub use output::{Message, MessageWriter};
pub use state::{BookmarkMonitor, State};
pub use sync::{RecordTransformer, SyncEngine, SyncOverride, SyncSummary};
