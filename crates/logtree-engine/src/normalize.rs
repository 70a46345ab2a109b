//! Converts caller payloads into the canonical byte form for a record's
//! declared data kind.
//!
//! Built-in rules cover text, JSON values, captured faults, and raw bytes.
//! Anything else goes through the open [`Normalizer`] registry so external
//! collaborators (e.g. request/response capture) can teach the engine new
//! payload shapes without touching this module. Normalization always runs
//! before a record is opened; a failure here produces no partial record.

use crate::error::{Error, Result};
use crate::labels::{DataKind, Label, Props, RecordKind};
use bytes::Bytes;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;

/// A captured error: its message plus diagnostic trace text (the rendered
/// cause chain).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub message: String,
    pub trace: String,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Fault {
            trace: message.clone(),
            message,
        }
    }

    /// Captures an error and its `source()` chain as trace text.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let message = err.to_string();
        let mut trace = message.clone();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push_str("\n  caused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        Fault { message, trace }
    }
}

/// A value handed to [`Session::write`](crate::session::Session::write).
///
/// `Custom` payloads are only understood through registered normalizers.
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
    Fault(Fault),
    Bytes(Bytes),
    Custom(Box<dyn Any + Send + Sync>),
}

impl Payload {
    /// Labels assumed when the caller supplies none, chosen by payload shape
    /// before normalization: text stays text, raw bytes stay binary (they are
    /// never coerced to a textual kind), everything else is structured.
    pub fn default_labels(&self) -> Vec<Label> {
        let data = match self {
            Payload::Text(_) => DataKind::Text,
            Payload::Bytes(_) => DataKind::Binary,
            Payload::Json(_) | Payload::Fault(_) | Payload::Custom(_) => DataKind::Json,
        };
        vec![Label::Record(RecordKind::Generic), Label::Data(data)]
    }

    fn shape(&self) -> &'static str {
        match self {
            Payload::Text(_) => "text",
            Payload::Json(_) => "json",
            Payload::Fault(_) => "fault",
            Payload::Bytes(_) => "bytes",
            Payload::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Payload").field(&self.shape()).finish()
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Fault> for Payload {
    fn from(fault: Fault) -> Self {
        Payload::Fault(fault)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

/// Pluggable normalizer for payload shapes the engine doesn't know about.
///
/// Returning `None` means "not mine"; the next registered normalizer is
/// consulted. The registry is consulted only for `Payload::Custom` values.
pub trait Normalizer: Send + Sync + 'static {
    fn try_normalize(&self, value: &(dyn Any + Send + Sync), props: &Props)
        -> Option<Result<Bytes>>;
}

/// Produces the canonical bytes for `payload` under the resolved `props`.
pub fn normalize(payload: &Payload, props: &Props, extra: &[Arc<dyn Normalizer>]) -> Result<Bytes> {
    let kind = props.data_kind();
    match (payload, kind) {
        // Literal text under any textual kind, including a pre-encoded string
        // handed in under DATA_JSON: it is not re-encoded.
        (Payload::Text(text), DataKind::Text)
        | (Payload::Text(text), DataKind::Json)
        | (Payload::Text(text), DataKind::Xml)
        | (Payload::Text(text), DataKind::Html) => Ok(Bytes::copy_from_slice(text.as_bytes())),

        (Payload::Fault(fault), DataKind::Text) => Ok(Bytes::from(fault.trace.clone())),
        (Payload::Fault(fault), DataKind::Json) => encode_json(fault),

        (Payload::Json(value), DataKind::Json) => encode_json(value),

        (Payload::Bytes(bytes), DataKind::Binary) => Ok(bytes.clone()),

        (Payload::Custom(value), _) => {
            for normalizer in extra {
                if let Some(result) = normalizer.try_normalize(value.as_ref(), props) {
                    return result;
                }
            }
            Err(Error::Normalization(format!(
                "no registered normalizer accepts a custom payload as {:?}",
                kind
            )))
        }

        (payload, kind) => Err(Error::Normalization(format!(
            "{} payload cannot express {:?} data",
            payload.shape(),
            kind
        ))),
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| Error::Normalization(e.to_string()))
}
