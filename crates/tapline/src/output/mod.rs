//! Singer wire messages.
//!
//! Every message is one compact JSON document on its own line:
//!
//! ```text
//! {"type":"SCHEMA","stream":"events","schema":{...},"key_properties":["id"]}
//! {"type":"RECORD","stream":"events","record":{...}}
//! {"type":"STATE","value":{"bookmarks":{...}}}
//! ```

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::state::State;

/// One Singer message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Schema {
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bookmark_properties: Option<Vec<String>>,
    },
    Record {
        stream: String,
        record: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_extracted: Option<DateTime<Utc>>,
    },
    State {
        value: Value,
    },
}

/// Writes messages as JSON lines.
pub struct MessageWriter<'w> {
    out: &'w mut dyn Write,
    records: u64,
}

impl<'w> MessageWriter<'w> {
    pub fn new(out: &'w mut dyn Write) -> Self {
        Self { out, records: 0 }
    }

    /// Write one message. STATE messages are flushed immediately.
    pub fn write(&mut self, message: &Message) -> Result<()> {
        serde_json::to_writer(&mut *self.out, message)?;
        self.out.write_all(b"\n")?;

        match message {
            Message::State { .. } => self.out.flush()?,
            Message::Record { .. } => self.records += 1,
            Message::Schema { .. } => {}
        }
        Ok(())
    }

    pub fn write_schema(
        &mut self,
        stream: &str,
        schema: &Value,
        key_properties: Vec<String>,
        bookmark_properties: Option<Vec<String>>,
    ) -> Result<()> {
        self.write(&Message::Schema {
            stream: stream.to_string(),
            schema: schema.clone(),
            key_properties,
            bookmark_properties,
        })
    }

    pub fn write_record(&mut self, stream: &str, record: Value) -> Result<()> {
        self.write(&Message::Record {
            stream: stream.to_string(),
            record,
            time_extracted: Some(Utc::now()),
        })
    }

    pub fn write_state(&mut self, state: &State) -> Result<()> {
        self.write(&Message::State {
            value: state.to_value()?,
        })
    }

    /// RECORD messages written so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Parse JSON-lines output back into messages.
pub fn parse_messages(output: &str) -> Result<Vec<Message>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}
