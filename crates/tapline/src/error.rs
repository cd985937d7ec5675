//! Error types for the tap engine.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Main error type for tap operations.
#[derive(Error, Debug)]
pub enum TapError {
    /// Configuration missing, malformed, or rejected by a schema adapter.
    #[error("Configuration error: {0}")]
    ConfigValidation(String),

    /// Neither a sync override nor any registered stream exists.
    #[error("Sync mode not defined: {0}")]
    SyncModeNotDefined(String),

    /// The tap requires a catalog but none was supplied.
    #[error(
        "This tap requires a catalog to be specified using --catalog <file.json>. \
         Please provide a catalog file."
    )]
    MissingCatalog,

    /// A stream asked for the client before one was configured.
    #[error("No client configured, configure a client constructor with TapBuilder::client")]
    NoClientConfigured,

    /// The client was requested as a different type than the one constructed.
    #[error("Configured client is not of the requested type {expected}")]
    ClientTypeMismatch { expected: &'static str },

    /// Two registrations collided on the same unique stream id.
    #[error(
        "Attempted to register duplicate stream ({0}). For a single type that handles \
         multiple streams, register each one with a distinct tap_stream_id:\n\n\
         \tStreamDescriptor::new(MyStream).with_tap_stream_id(\"invoices\")\n\
         \tStreamDescriptor::new(MyStream).with_tap_stream_id(\"contacts\")"
    )]
    DuplicateStream(String),

    /// A stream was registered under an unusable id.
    #[error("Invalid stream id {id:?}: {reason}")]
    InvalidStreamId { id: String, reason: String },

    /// Streams the tap declared as required were never registered.
    #[error("Expected streams were not registered: {}", .0.join(", "))]
    StreamsNotFound(Vec<String>),

    /// A WSDL schema source was declared without a location.
    #[error(
        "In order to specify a wsdl schema location, you must provide either a url \
         or a filepath to locate the XSD file."
    )]
    NoWsdlLocationSpecified,

    /// A declared capability that has no implementation yet.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// A stream's schema could not be loaded.
    #[error("Schema for stream {stream} could not be loaded: {message}")]
    Schema { stream: String, message: String },

    /// A stream's record procedure failed.
    #[error("Sync failed for stream {stream}: {message}")]
    Stream { stream: String, message: String },

    /// A record value did not conform to the stream's schema.
    #[error("Record transform failed for {stream}.{field}: {message}")]
    Transform {
        stream: String,
        field: String,
        message: String,
    },

    /// IO error (file operations, output writes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TapError {
    /// Create a Stream error.
    pub fn stream(stream: impl Into<String>, message: impl Into<String>) -> Self {
        TapError::Stream {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidStreamId error.
    pub fn invalid_stream_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        TapError::InvalidStreamId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Attach the path of the file being read to an IO or JSON error.
    pub fn in_file(path: &Path, error: TapError) -> Self {
        match error {
            TapError::Io(e) => {
                TapError::Io(io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
            }
            TapError::Json(e) => TapError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: {}", path.display(), e),
            )),
            other => other,
        }
    }

    /// Create a Schema error.
    pub fn schema(stream: impl Into<String>, message: impl Into<String>) -> Self {
        TapError::Schema {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create a Transform error.
    pub fn transform(
        stream: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TapError::Transform {
            stream: stream.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Usage errors (bad config, missing catalog) exit with 2, everything else with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            TapError::ConfigValidation(_) | TapError::MissingCatalog => 2,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for tap operations.
pub type Result<T> = std::result::Result<T, TapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_stream_message_mentions_tap_stream_id() {
        let err = TapError::DuplicateStream("contacts".into());
        let msg = err.to_string();
        assert!(msg.contains("(contacts)"));
        assert!(msg.contains("with_tap_stream_id"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(TapError::MissingCatalog.exit_code(), 2);
        assert_eq!(TapError::ConfigValidation("x".into()).exit_code(), 2);
        assert_eq!(TapError::NoClientConfigured.exit_code(), 1);
        assert_eq!(TapError::stream("s", "boom").exit_code(), 1);
        assert_eq!(TapError::invalid_stream_id("a b", "whitespace").exit_code(), 1);
    }

    #[test]
    fn test_streams_not_found_lists_ids() {
        let err = TapError::StreamsNotFound(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Expected streams were not registered: a, b");
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err = TapError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: missing.json"));
    }

    #[test]
    fn test_in_file_names_the_path() {
        let path = Path::new("state.json");

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = TapError::in_file(path, TapError::from(json));
        assert!(matches!(err, TapError::Io(ref e) if e.kind() == io::ErrorKind::InvalidData));
        assert!(err.to_string().contains("state.json: "));

        let missing = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err = TapError::in_file(path, TapError::from(missing));
        assert!(matches!(err, TapError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
        assert_eq!(err.to_string(), "IO error: state.json: no such file");

        let err = TapError::in_file(path, TapError::MissingCatalog);
        assert!(matches!(err, TapError::MissingCatalog));
    }
}
