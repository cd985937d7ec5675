//! Core abstractions for tap orchestration.
//!
//! - [`traits`]: the [`Stream`] trait and the contexts streams run in
//! - [`registry`]: explicit stream registry keyed by unique id
//! - [`catalog`] / [`metadata`]: the Singer catalog model and its defaults
//! - [`schema`]: JSON Schema helpers and schema sources
//! - [`identifier`]: stream id derivation from type names

pub mod catalog;
pub mod identifier;
pub mod metadata;
pub mod registry;
pub mod schema;
pub mod traits;

pub use catalog::{Catalog, CatalogEntry, ReplicationMethod};
pub use identifier::{pascal_to_snake, stream_id_for};
pub use metadata::{Breadcrumb, Metadata, MetadataBuilder};
pub use registry::{StreamDescriptor, StreamRegistry};
pub use schema::{empty_schema, SchemaSource};
pub use traits::{
    BookmarkStrategy, Record, RecordIter, RecordSerializer, Stream, StreamAttributes,
    SyncContext, TapContext,
};
