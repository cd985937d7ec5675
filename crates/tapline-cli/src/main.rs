//! tapline-demo - a small in-memory tap exercising discovery and sync.
//!
//! Streams:
//!
//! - `countries`: full table, keyed by `code`
//! - `events`: incremental on `updated_at`, starting from the `start_date`
//!   config value or the bookmark in `--state`

use std::cmp::Ordering;
use std::process::ExitCode;

use serde_json::{json, Value};
use tapline::state::compare_bookmarks;
use tapline::{
    ConfigMap, ConfigSpec, RecordIter, Result, SchemaSource, Stream, StreamAttributes,
    SyncContext, Tap, TapContext, TapError,
};
use tracing::debug;

/// Stand-in for an API client: serves canned pages of data.
struct DemoClient {
    page_size: usize,
}

impl DemoClient {
    fn from_config(config: &ConfigMap) -> Result<Self> {
        let page_size = match config.get("page_size") {
            None => 100,
            Some(v) => v
                .as_u64()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    TapError::ConfigValidation("page_size must be a positive integer".into())
                })? as usize,
        };
        Ok(Self { page_size })
    }

    fn countries(&self) -> Vec<Value> {
        [("NZ", "New Zealand"), ("CL", "Chile"), ("IS", "Iceland")]
            .iter()
            .take(self.page_size)
            .map(|(code, name)| json!({"code": code, "name": name}))
            .collect()
    }

    fn events(&self) -> Vec<Value> {
        [
            (1, "signup", "2020-01-05T09:00:00Z"),
            (2, "login", "2020-02-11T17:30:00Z"),
            (3, "purchase", "2020-03-02T08:15:00+01:00"),
            (4, "logout", "2020-03-02T12:00:00Z"),
        ]
        .iter()
        .take(self.page_size)
        .map(|(id, kind, at)| json!({"id": id, "kind": kind, "updated_at": at}))
        .collect()
    }
}

struct Countries {
    schema: SchemaSource,
}

impl Stream for Countries {
    fn attributes(&self) -> StreamAttributes {
        StreamAttributes::new().key_properties(["code"])
    }

    fn schema(&self, ctx: &TapContext<'_>) -> Result<Value> {
        self.schema.load("countries", ctx)
    }

    fn sync<'a>(&'a self, ctx: &'a SyncContext<'a>) -> Result<RecordIter<'a>> {
        let client = ctx.client::<DemoClient>()?;
        Ok(Box::new(client.countries().into_iter().map(Ok)))
    }
}

struct Events {
    schema: SchemaSource,
}

impl Stream for Events {
    fn attributes(&self) -> StreamAttributes {
        StreamAttributes::new()
            .key_properties(["id"])
            .replication_key("updated_at")
    }

    fn schema(&self, ctx: &TapContext<'_>) -> Result<Value> {
        self.schema.load("events", ctx)
    }

    fn sync<'a>(&'a self, ctx: &'a SyncContext<'a>) -> Result<RecordIter<'a>> {
        let client = ctx.client::<DemoClient>()?;
        let since = ctx.bookmark().cloned();
        debug!("events: reading since {:?}", since);

        Ok(Box::new(client.events().into_iter().filter_map(move |event| {
            match (&since, event.get("updated_at")) {
                (Some(since), Some(at)) => match compare_bookmarks(since, at) {
                    Some(Ordering::Greater) => None,
                    Some(_) => Some(Ok(event)),
                    None => Some(Err(TapError::stream(
                        "events",
                        format!("bookmark {} cannot be compared with {}", since, at),
                    ))),
                },
                _ => Some(Ok(event)),
            }
        })))
    }
}

fn build_tap() -> Result<Tap> {
    Tap::builder()
        .config_spec(ConfigSpec::required_keys(["start_date"]))
        .client(DemoClient::from_config)
        .stream(Countries {
            schema: SchemaSource::inline(json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string"},
                    "name": {"type": ["null", "string"]}
                }
            })),
        })
        .stream(Events {
            schema: SchemaSource::inline(json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "kind": {"type": "string"},
                    "updated_at": {"type": "string", "format": "date-time"}
                }
            })),
        })
        .expect_streams(["countries", "events"])
        .build()
}

fn main() -> ExitCode {
    match build_tap() {
        Ok(tap) => tapline_cli::main_with(&tap),
        Err(e) => tapline_cli::report(&e),
    }
}
