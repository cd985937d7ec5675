//! Stream registry.
//!
//! The [`StreamRegistry`] maps unique stream ids to stream descriptors. It is
//! built explicitly by the tap's entry point and handed to the engines,
//! rather than populated by global registration.
//!
//! ```rust,ignore
//! let mut registry = StreamRegistry::new();
//! registry.register_stream(Contacts)?;                  // id "contacts"
//! registry.register(
//!     StreamDescriptor::new(Report::default()).with_tap_stream_id("weekly_report"),
//! )?;
//! ```

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::identifier::{stream_id_for, validate_stream_id};
use super::traits::Stream;
use crate::error::{Result, TapError};

/// A registered stream and its names.
#[derive(Clone)]
pub struct StreamDescriptor {
    unique_name: String,
    display_name: String,
    alias: Option<String>,
    stream: Rc<dyn Stream>,
}

impl StreamDescriptor {
    /// Describe a stream; both names are derived from its type name.
    pub fn new<S: Stream + 'static>(stream: S) -> Self {
        let name = stream_id_for::<S>();
        Self {
            unique_name: name.clone(),
            display_name: name,
            alias: None,
            stream: Rc::new(stream),
        }
    }

    /// Use an explicit id for catalog, state and bookmarks.
    pub fn with_tap_stream_id(mut self, id: impl Into<String>) -> Self {
        self.unique_name = id.into();
        self
    }

    /// Override the human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Name emitted in SCHEMA and RECORD messages instead of the id.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Name used on the wire: the alias if set, else the unique name.
    pub fn emitted_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.unique_name)
    }

    pub fn stream(&self) -> &dyn Stream {
        self.stream.as_ref()
    }
}

impl fmt::Debug for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDescriptor")
            .field("unique_name", &self.unique_name)
            .field("display_name", &self.display_name)
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

/// Registry of streams keyed by unique id, in registration order.
#[derive(Default)]
pub struct StreamRegistry {
    streams: Vec<StreamDescriptor>,
}

impl StreamRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream under the id derived from its type name.
    pub fn register_stream<S: Stream + 'static>(&mut self, stream: S) -> Result<()> {
        self.register(StreamDescriptor::new(stream))
    }

    /// Register a descriptor.
    ///
    /// Fails with [`TapError::DuplicateStream`] if the unique name is taken.
    pub fn register(&mut self, descriptor: StreamDescriptor) -> Result<()> {
        validate_stream_id(descriptor.unique_name())?;

        if self.contains(descriptor.unique_name()) {
            return Err(TapError::DuplicateStream(descriptor.unique_name().to_string()));
        }

        debug!(
            "Registered stream {} ({})",
            descriptor.unique_name(),
            descriptor.display_name()
        );
        self.streams.push(descriptor);
        Ok(())
    }

    /// Look up a descriptor by unique id.
    pub fn lookup(&self, id: &str) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|d| d.unique_name == id)
    }

    /// Whether an id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_some()
    }

    /// All descriptors in registration order.
    pub fn all(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.iter()
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.streams.iter().map(|d| d.unique_name.clone()).collect()
    }

    /// Fail with [`TapError::StreamsNotFound`] unless every id is registered.
    pub fn require<I, S>(&self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let missing: Vec<String> = ids
            .into_iter()
            .filter(|id| !self.contains(id.as_ref()))
            .map(|id| id.as_ref().to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TapError::StreamsNotFound(missing))
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("streams", &self.ids())
            .finish()
    }
}
