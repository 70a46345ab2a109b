//! Closed label registry and resolved property sets.
//!
//! Call sites use short symbolic names (`RECORD_EXCEPTION`, `DATA_TEXT`);
//! storage layout and data normalization consume the fully-resolved [`Props`].
//! Each label targets exactly one dimension (session kind, record kind, or
//! data kind). Resolution merges explicit labels over a complete default set:
//! explicit beats default, and when two labels target the same dimension the
//! last one applied wins. Extending the vocabulary means adding enum variants
//! and registry entries, never changing resolution logic.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of logical scope a session represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    #[serde(rename = "SESSION_GENERIC")]
    Generic,
    /// One per process run.
    #[serde(rename = "SESSION_APP_RUN")]
    AppRun,
    /// One per inbound server request.
    #[serde(rename = "SESSION_SERVER_REQUEST")]
    ServerRequest,
}

/// Kind of entry a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// Session metadata written by front-ends at session start.
    #[serde(rename = "RECORD_META")]
    Meta,
    /// Session teardown marker written by front-ends.
    #[serde(rename = "RECORD_CLOSE")]
    Close,
    #[serde(rename = "RECORD_GENERIC")]
    Generic,
    #[serde(rename = "RECORD_EXCEPTION")]
    Exception,
    #[serde(rename = "RECORD_DEBUG")]
    Debug,
    /// Captured output stream (e.g. redirected stdout/stderr).
    #[serde(rename = "RECORD_STREAM")]
    Stream,
    #[serde(rename = "RECORD_SERVER_ENV")]
    ServerEnv,
    #[serde(rename = "RECORD_SERVER_REQUEST")]
    ServerRequest,
    #[serde(rename = "RECORD_SERVER_RESPONSE")]
    ServerResponse,
}

impl RecordKind {
    /// Short tag backends may embed in storage object names.
    pub fn storage_tag(&self) -> &'static str {
        match self {
            RecordKind::Meta => "meta",
            RecordKind::Close => "close",
            RecordKind::Generic => "generic",
            RecordKind::Exception => "exception",
            RecordKind::Debug => "debug",
            RecordKind::Stream => "stream",
            RecordKind::ServerEnv => "env",
            RecordKind::ServerRequest => "request",
            RecordKind::ServerResponse => "response",
        }
    }
}

/// Declared shape of a record's payload. Fixed at open time; determines how
/// writes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    #[serde(rename = "DATA_TEXT")]
    Text,
    #[serde(rename = "DATA_JSON")]
    Json,
    #[serde(rename = "DATA_XML")]
    Xml,
    #[serde(rename = "DATA_HTML")]
    Html,
    #[serde(rename = "DATA_BINARY")]
    Binary,
}

impl DataKind {
    /// File extension backends may use for storage objects of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            DataKind::Text => "txt",
            DataKind::Json => "json",
            DataKind::Xml => "xml",
            DataKind::Html => "html",
            DataKind::Binary => "bin",
        }
    }
}

/// One entry of the closed label registry: a symbolic name bound to a single
/// (dimension, value) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Session(SessionKind),
    Record(RecordKind),
    Data(DataKind),
}

impl Label {
    /// Validated registry lookup for text front-ends. Unknown names fail
    /// synchronously, before any record is opened.
    pub fn parse(name: &str) -> Result<Label> {
        Ok(match name {
            "SESSION_GENERIC" => Label::Session(SessionKind::Generic),
            "SESSION_APP_RUN" => Label::Session(SessionKind::AppRun),
            "SESSION_SERVER_REQUEST" => Label::Session(SessionKind::ServerRequest),
            "RECORD_META" => Label::Record(RecordKind::Meta),
            "RECORD_CLOSE" => Label::Record(RecordKind::Close),
            "RECORD_GENERIC" => Label::Record(RecordKind::Generic),
            "RECORD_EXCEPTION" => Label::Record(RecordKind::Exception),
            "RECORD_DEBUG" => Label::Record(RecordKind::Debug),
            "RECORD_STREAM" => Label::Record(RecordKind::Stream),
            "RECORD_SERVER_ENV" => Label::Record(RecordKind::ServerEnv),
            "RECORD_SERVER_REQUEST" => Label::Record(RecordKind::ServerRequest),
            "RECORD_SERVER_RESPONSE" => Label::Record(RecordKind::ServerResponse),
            "DATA_TEXT" => Label::Data(DataKind::Text),
            "DATA_JSON" => Label::Data(DataKind::Json),
            "DATA_XML" => Label::Data(DataKind::Xml),
            "DATA_HTML" => Label::Data(DataKind::Html),
            "DATA_BINARY" => Label::Data(DataKind::Binary),
            other => return Err(Error::UnknownLabel(other.to_string())),
        })
    }
}

/// Parses a list of symbolic names. The first unknown name aborts the whole
/// list so a partially-resolved label set can never reach storage.
pub fn parse_labels(names: &[&str]) -> Result<Vec<Label>> {
    names.iter().map(|name| Label::parse(name)).collect()
}

/// A resolved, immutable property set.
///
/// Dimensions present in the defaults are always populated after resolution;
/// `extra` carries free-form extension metadata that backends may interpret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Props {
    #[serde(rename = "SessionType", skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionKind>,
    #[serde(rename = "RecordType", skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordKind>,
    #[serde(rename = "DataType", skip_serializing_if = "Option::is_none")]
    pub data: Option<DataKind>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Props {
    /// Complete default set for records opened without explicit labels.
    pub fn record_defaults() -> Self {
        Props {
            session: None,
            record: Some(RecordKind::Generic),
            data: Some(DataKind::Json),
            extra: BTreeMap::new(),
        }
    }

    /// Props for a session of the given kind.
    pub fn for_session(kind: SessionKind) -> Self {
        Props {
            session: Some(kind),
            record: None,
            data: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Record kind, falling back to the default dimension value.
    pub fn record_kind(&self) -> RecordKind {
        self.record.unwrap_or(RecordKind::Generic)
    }

    /// Data kind, falling back to the default dimension value.
    pub fn data_kind(&self) -> DataKind {
        self.data.unwrap_or(DataKind::Json)
    }

    pub fn session_kind(&self) -> SessionKind {
        self.session.unwrap_or(SessionKind::Generic)
    }
}

/// Merges `labels` over `defaults`.
///
/// Deterministic for a given registry state: the result depends only on the
/// last label per dimension, never on the ordering of labels that target
/// different dimensions.
pub fn resolve(labels: &[Label], defaults: &Props) -> Props {
    let mut props = defaults.clone();
    for label in labels {
        match label {
            Label::Session(kind) => props.session = Some(*kind),
            Label::Record(kind) => props.record = Some(*kind),
            Label::Data(kind) => props.data = Some(*kind),
        }
    }
    props
}

/// Resolves symbolic names over `defaults`. Fails with `UnknownLabel` before
/// touching any dimension.
pub fn resolve_names(names: &[&str], defaults: &Props) -> Result<Props> {
    Ok(resolve(&parse_labels(names)?, defaults))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_known_labels() {
        assert_eq!(
            Label::parse("RECORD_EXCEPTION").unwrap(),
            Label::Record(RecordKind::Exception)
        );
        assert_eq!(
            Label::parse("DATA_TEXT").unwrap(),
            Label::Data(DataKind::Text)
        );
        assert_eq!(
            Label::parse("SESSION_APP_RUN").unwrap(),
            Label::Session(SessionKind::AppRun)
        );
    }

    #[test]
    fn test_parse_unknown_label_fails() {
        let err = Label::parse("RECORD_BOGUS").unwrap_err();
        assert!(matches!(err, Error::UnknownLabel(name) if name == "RECORD_BOGUS"));
    }

    #[test]
    fn test_parse_labels_aborts_on_first_unknown() {
        let err = parse_labels(&["RECORD_GENERIC", "NOPE", "DATA_TEXT"]).unwrap_err();
        assert!(matches!(err, Error::UnknownLabel(name) if name == "NOPE"));
    }

    #[test]
    fn test_resolve_explicit_beats_default() {
        let props = resolve_names(
            &["RECORD_EXCEPTION", "DATA_TEXT"],
            &Props::record_defaults(),
        )
        .unwrap();
        assert_eq!(props.record, Some(RecordKind::Exception));
        assert_eq!(props.data, Some(DataKind::Text));
    }

    #[test]
    fn test_resolve_keeps_unmentioned_dimensions() {
        let props = resolve_names(&["RECORD_EXCEPTION"], &Props::record_defaults()).unwrap();
        assert_eq!(props.record, Some(RecordKind::Exception));
        // Data dimension keeps the default.
        assert_eq!(props.data, Some(DataKind::Json));
    }

    #[test]
    fn test_resolve_last_wins_within_dimension() {
        let props = resolve_names(
            &["DATA_TEXT", "DATA_JSON", "DATA_BINARY"],
            &Props::record_defaults(),
        )
        .unwrap();
        assert_eq!(props.data, Some(DataKind::Binary));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let defaults = Props::record_defaults();
        let a = resolve_names(&["RECORD_EXCEPTION", "DATA_TEXT"], &defaults).unwrap();
        let b = resolve_names(&["RECORD_EXCEPTION", "DATA_TEXT"], &defaults).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_props_serializes_label_names() {
        let props = resolve_names(&["RECORD_EXCEPTION", "DATA_TEXT"], &Props::record_defaults())
            .unwrap()
            .with_extra("origin", "test");
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(json["RecordType"], "RECORD_EXCEPTION");
        assert_eq!(json["DataType"], "DATA_TEXT");
        assert_eq!(json["extra"]["origin"], "test");
    }

    fn arb_label() -> impl Strategy<Value = Label> {
        prop_oneof![
            Just(Label::Record(RecordKind::Generic)),
            Just(Label::Record(RecordKind::Exception)),
            Just(Label::Record(RecordKind::Debug)),
            Just(Label::Data(DataKind::Text)),
            Just(Label::Data(DataKind::Json)),
            Just(Label::Data(DataKind::Binary)),
            Just(Label::Session(SessionKind::Generic)),
            Just(Label::Session(SessionKind::ServerRequest)),
        ]
    }

    proptest! {
        /// Resolution is total: every dimension covered by the defaults stays
        /// covered, whatever labels are applied.
        #[test]
        fn prop_resolve_total(labels in prop::collection::vec(arb_label(), 0..8)) {
            let props = resolve(&labels, &Props::record_defaults());
            prop_assert!(props.record.is_some());
            prop_assert!(props.data.is_some());
        }

        /// Labels targeting different dimensions commute.
        #[test]
        fn prop_non_conflicting_labels_commute(
            record in prop_oneof![
                Just(RecordKind::Generic),
                Just(RecordKind::Exception),
                Just(RecordKind::Stream),
            ],
            data in prop_oneof![
                Just(DataKind::Text),
                Just(DataKind::Json),
                Just(DataKind::Binary),
            ],
        ) {
            let defaults = Props::record_defaults();
            let forward = resolve(&[Label::Record(record), Label::Data(data)], &defaults);
            let backward = resolve(&[Label::Data(data), Label::Record(record)], &defaults);
            prop_assert_eq!(forward, backward);
        }
    }
}
