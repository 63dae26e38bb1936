//! Broker records and value objects.
//!
//! # Design
//! The broker adds fields between versions, so every record declares the
//! fields this crate knows about and collects the rest in `extra`. Records
//! are built from a decoded `Record`: a declared field whose value is null or
//! of an unexpected JSON type stays in `extra` untouched, and absent fields are
//! skipped on output, so a record serializes back to exactly the keys and
//! values it was read from. Only `name` is required.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A JSON object decoded without schema validation.
pub type Record = Map<String, Value>;

/// Broker-wide summary returned by `/api/overview`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Record")]
pub struct Overview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics_db_node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_totals: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listeners: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_stats: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

/// A virtual host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Record")]
pub struct Vhost {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracing: Option<bool>,
    #[serde(flatten)]
    pub extra: Record,
}

/// Snapshot of a queue as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Record")]
pub struct Queue {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vhost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_ready: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_unacknowledged: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumers: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(flatten)]
    pub extra: Record,
}

impl Queue {
    /// A queue known only by name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vhost: None,
            durable: None,
            auto_delete: None,
            arguments: None,
            node: None,
            messages: None,
            messages_ready: None,
            messages_unacknowledged: None,
            consumers: None,
            memory: None,
            extra: Record::new(),
        }
    }

    /// A queue named `name` carrying `properties`. A `name` key in
    /// `properties` replaces the given name; only a non-string `name` fails.
    /// Properties whose shape does not fit a declared field are kept in
    /// `extra` as given.
    pub fn with_properties(name: &str, properties: Record) -> Result<Self> {
        from_properties(name, properties)
    }

    /// Broker field kept in `extra`: undeclared, null, or of an unexpected type.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Snapshot of an exchange as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Record")]
pub struct Exchange {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vhost: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Record>,
    #[serde(flatten)]
    pub extra: Record,
}

impl Exchange {
    /// An exchange known only by name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vhost: None,
            kind: None,
            durable: None,
            auto_delete: None,
            internal: None,
            arguments: None,
            extra: Record::new(),
        }
    }

    /// An exchange named `name` carrying `properties`. A `name` key in
    /// `properties` replaces the given name; only a non-string `name` fails.
    /// Properties whose shape does not fit a declared field are kept in
    /// `extra` as given.
    pub fn with_properties(name: &str, properties: Record) -> Result<Self> {
        from_properties(name, properties)
    }

    /// Broker field kept in `extra`: undeclared, null, or of an unexpected type.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Body for declaring a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueOptions {
    pub durable: bool,
    pub auto_delete: bool,
    #[serde(default)]
    pub arguments: Record,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            durable: true,
            auto_delete: false,
            arguments: Record::new(),
        }
    }
}

/// Body for declaring an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOptions {
    #[serde(rename = "type")]
    pub kind: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    #[serde(default)]
    pub arguments: Record,
}

impl ExchangeOptions {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            durable: true,
            auto_delete: false,
            internal: false,
            arguments: Record::new(),
        }
    }
}

impl From<Record> for Overview {
    fn from(mut extra: Record) -> Self {
        Self {
            node: take(&mut extra, "node"),
            management_version: take(&mut extra, "management_version"),
            statistics_db_node: take(&mut extra, "statistics_db_node"),
            statistics_level: take(&mut extra, "statistics_level"),
            queue_totals: take(&mut extra, "queue_totals"),
            listeners: take(&mut extra, "listeners"),
            message_stats: take(&mut extra, "message_stats"),
            extra,
        }
    }
}

impl TryFrom<Record> for Vhost {
    type Error = String;

    fn try_from(mut extra: Record) -> std::result::Result<Self, String> {
        Ok(Self {
            name: take_name(&mut extra)?,
            tracing: take(&mut extra, "tracing"),
            extra,
        })
    }
}

impl TryFrom<Record> for Queue {
    type Error = String;

    fn try_from(mut extra: Record) -> std::result::Result<Self, String> {
        Ok(Self {
            name: take_name(&mut extra)?,
            vhost: take(&mut extra, "vhost"),
            durable: take(&mut extra, "durable"),
            auto_delete: take(&mut extra, "auto_delete"),
            arguments: take(&mut extra, "arguments"),
            node: take(&mut extra, "node"),
            messages: take(&mut extra, "messages"),
            messages_ready: take(&mut extra, "messages_ready"),
            messages_unacknowledged: take(&mut extra, "messages_unacknowledged"),
            consumers: take(&mut extra, "consumers"),
            memory: take(&mut extra, "memory"),
            extra,
        })
    }
}

impl TryFrom<Record> for Exchange {
    type Error = String;

    fn try_from(mut extra: Record) -> std::result::Result<Self, String> {
        Ok(Self {
            name: take_name(&mut extra)?,
            vhost: take(&mut extra, "vhost"),
            kind: take(&mut extra, "type"),
            durable: take(&mut extra, "durable"),
            auto_delete: take(&mut extra, "auto_delete"),
            internal: take(&mut extra, "internal"),
            arguments: take(&mut extra, "arguments"),
            extra,
        })
    }
}

/// Move `key` out of `record` if it decodes as `T`; otherwise leave it there.
fn take<T: DeserializeOwned>(record: &mut Record, key: &str) -> Option<T> {
    let value = record.get(key)?;
    if value.is_null() {
        return None;
    }
    let typed = T::deserialize(value).ok()?;
    record.remove(key);
    Some(typed)
}

fn take_name(record: &mut Record) -> std::result::Result<String, String> {
    match record.remove("name") {
        Some(Value::String(name)) => Ok(name),
        Some(other) => Err(format!("invalid type for `name`: expected a string, got {other}")),
        None => Err("missing field `name`".to_string()),
    }
}

/// Convert a decoded record into one of the typed records above.
pub fn from_record<D: DeserializeOwned>(record: Record) -> Result<D> {
    serde_json::from_value(Value::Object(record)).map_err(|e| Error::Deserialization(e.to_string()))
}

fn from_properties<D: DeserializeOwned>(name: &str, properties: Record) -> Result<D> {
    let mut record = Record::new();
    record.insert("name".to_string(), Value::String(name.to_string()));
    record.extend(properties);
    from_record(record)
}
