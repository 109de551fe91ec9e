//! Event decoding and declarative event assertions.
//!
//! A transaction receipt carries raw logs (topics + data). This module
//! decodes them against a contract ABI into named events, and matches the
//! result with [`EventMatcher`], a serializable description of "an event
//! with this name whose fields have these values", kept declarative so test
//! reports can print exactly what was expected.

use std::collections::BTreeMap;

use alloy_core::dyn_abi::{DynSolValue, EventExt};
use alloy_core::json_abi::JsonAbi;
use alloy_core::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::TxReceipt;

/// One raw log entry from a transaction receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLog {
    /// The contract that emitted the log.
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
}

/// A decoded event: its name and named field values.
///
/// Field values are canonical JSON forms: addresses and byte strings as
/// 0x-prefixed lowercase hex, integers as decimal strings, strings and
/// bools as themselves. One transaction yields zero or more events, in
/// emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmittedEvent {
    pub name: String,
    pub fields: BTreeMap<String, Value>,
}

impl EmittedEvent {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Decode a receipt's raw logs against a contract ABI, in emission order.
///
/// Logs whose first topic matches no event in the ABI are skipped, as are
/// logs that fail to decode; receipts routinely carry logs from other
/// contracts touched by the same transaction.
pub fn decode_events(abi: &JsonAbi, logs: &[RawLog]) -> Vec<EmittedEvent> {
    logs.iter().filter_map(|log| decode_log(abi, log)).collect()
}

fn decode_log(abi: &JsonAbi, log: &RawLog) -> Option<EmittedEvent> {
    let topic0 = log.topics.first()?;
    let event = abi
        .events
        .values()
        .flatten()
        .find(|e| !e.anonymous && e.selector() == *topic0)?;

    let decoded = match event.decode_log_parts(log.topics.iter().copied(), &log.data, true) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::debug!(event = %event.name, error = %e, "Failed to decode log, skipping");
            return None;
        }
    };

    // Indexed fields come from the topics, the rest from the data section;
    // the ABI's input order interleaves them back into one named map.
    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    let mut fields = BTreeMap::new();
    for input in &event.inputs {
        let value = if input.indexed {
            indexed.next()?
        } else {
            body.next()?
        };
        fields.insert(input.name.clone(), canonical_value(&value));
    }

    Some(EmittedEvent {
        name: event.name.clone(),
        fields,
    })
}

/// Canonical JSON form of an ABI value.
pub fn canonical_value(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::Address(a) => Value::String(format!("0x{}", hex::encode(a))),
        DynSolValue::Function(f) => Value::String(format!("0x{}", hex::encode(f.0))),
        DynSolValue::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(values)
        | DynSolValue::FixedArray(values)
        | DynSolValue::Tuple(values) => {
            Value::Array(values.iter().map(canonical_value).collect())
        }
        _ => Value::Null,
    }
}

/// A declarative matcher over a named event's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMatcher {
    /// The event name to look for.
    pub event: String,
    /// Field conditions; all must hold on the same event.
    #[serde(default)]
    pub fields: Vec<FieldMatch>,
}

/// One field condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldMatch {
    /// The field equals the given canonical value.
    Eq { field: String, value: Value },
    /// The field equals one of the given canonical values.
    OneOf { field: String, values: Vec<Value> },
}

impl FieldMatch {
    fn satisfied_by(&self, event: &EmittedEvent) -> bool {
        match self {
            FieldMatch::Eq { field, value } => event.field(field) == Some(value),
            FieldMatch::OneOf { field, values } => {
                event.field(field).is_some_and(|v| values.contains(v))
            }
        }
    }
}

impl EventMatcher {
    /// Match any event with the given name.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            fields: Vec::new(),
        }
    }

    /// Require a field to equal a value.
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push(FieldMatch::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Require a field to equal one of several values.
    pub fn field_one_of(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.fields.push(FieldMatch::OneOf {
            field: field.into(),
            values,
        });
        self
    }

    /// Whether a single decoded event satisfies this matcher.
    pub fn matches(&self, event: &EmittedEvent) -> bool {
        event.name == self.event && self.fields.iter().all(|f| f.satisfied_by(event))
    }

    /// Scan the receipt's events in order; true at the first event that
    /// satisfies the matcher, false if none does (an empty event list never
    /// matches). There is no waiting here: the receipt is already
    /// finalized, so callers must have awaited confirmation first.
    pub fn assert_emitted(&self, receipt: &TxReceipt) -> bool {
        receipt.events.iter().any(|event| self.matches(event))
    }
}
