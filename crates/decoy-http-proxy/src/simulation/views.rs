//! Wire shapes of the simulation document.
//!
//! These mirror the JSON layout one-to-one; `normalize` turns them into the
//! canonical model and `export` builds them back from it.

use super::types::ResponseTemplate;
use crate::behaviors::{DelayRule, LogNormalDelayRule};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationView {
    pub data: DataView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaView>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataView {
    #[serde(default)]
    pub pairs: Vec<PairView>,
    #[serde(default)]
    pub global_actions: GlobalActionsView,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalActionsView {
    #[serde(default)]
    pub delays: Vec<DelayRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delays_log_normal: Vec<LogNormalDelayRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hoverfly_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_exported: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairView {
    pub request: RequestView,
    #[serde(default)]
    pub response: ResponseTemplate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<FieldView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<FieldView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<FieldView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<FieldView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<FieldView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<FieldView>,
    #[serde(
        default,
        deserialize_with = "string_or_seq_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub headers: BTreeMap<String, Vec<String>>,
    /// Legacy v1 field; accepted and ignored.
    #[serde(default, skip_serializing)]
    pub request_type: Option<serde_json::Value>,
}

/// One matcher-bearing request field as written in the document.
///
/// `Matchers` keeps document order: matcher key and its patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldView {
    Bare(String),
    Matchers(Vec<(String, Vec<String>)>),
}

impl<'de> Deserialize<'de> for FieldView {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldVisitor;

        impl<'de> Visitor<'de> for FieldVisitor {
            type Value = FieldView;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a matcher object or a string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<FieldView, E> {
                Ok(FieldView::Bare(value.to_string()))
            }

            fn visit_map<A>(self, mut map: A) -> Result<FieldView, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut matchers = Vec::new();
                while let Some((key, patterns)) = map.next_entry::<String, OneOrMany>()? {
                    matchers.push((key, patterns.into_vec()));
                }
                Ok(FieldView::Matchers(matchers))
            }
        }

        deserializer.deserialize_any(FieldVisitor)
    }
}

impl Serialize for FieldView {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldView::Bare(value) => serializer.serialize_str(value),
            FieldView::Matchers(matchers) => {
                let mut map = serializer.serialize_map(Some(matchers.len()))?;
                for (key, patterns) in matchers {
                    match patterns.as_slice() {
                        [single] => map.serialize_entry(key, single)?,
                        many => map.serialize_entry(key, many)?,
                    }
                }
                map.end()
            }
        }
    }
}

/// A string or an array of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Deserialize a map whose values are either a string or an array of strings.
pub fn string_or_seq_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, OneOrMany> = BTreeMap::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.into_vec())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_view_preserves_document_order() {
        let field: FieldView =
            serde_json::from_str(r#"{"regexMatch": "a", "exactMatch": ["b", "c"]}"#).unwrap();
        assert_eq!(
            field,
            FieldView::Matchers(vec![
                ("regexMatch".into(), vec!["a".into()]),
                ("exactMatch".into(), vec!["b".into(), "c".into()]),
            ])
        );
    }

    #[test]
    fn test_field_view_bare_string() {
        let field: FieldView = serde_json::from_str(r#""/api""#).unwrap();
        assert_eq!(field, FieldView::Bare("/api".into()));
    }

    #[test]
    fn test_field_view_rejects_non_string_patterns() {
        assert!(serde_json::from_str::<FieldView>(r#"{"exactMatch": 5}"#).is_err());
        assert!(serde_json::from_str::<FieldView>("42").is_err());
    }

    #[test]
    fn test_field_view_serializes_single_pattern_as_string() {
        let field = FieldView::Matchers(vec![
            ("globMatch".into(), vec!["*.com".into()]),
            ("exactMatch".into(), vec!["a".into(), "b".into()]),
        ]);
        assert_eq!(
            serde_json::to_string(&field).unwrap(),
            r#"{"globMatch":"*.com","exactMatch":["a","b"]}"#
        );
    }

    #[test]
    fn test_request_type_is_ignored() {
        let request: RequestView =
            serde_json::from_str(r#"{"requestType": "recording", "path": "/a"}"#).unwrap();
        assert!(request.request_type.is_some());
        let rendered = serde_json::to_string(&request).unwrap();
        assert!(!rendered.contains("requestType"));
    }
}
