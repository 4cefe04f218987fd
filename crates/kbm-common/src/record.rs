//! Source and destination record shapes
//!
//! [`RawRecord`] mirrors one element of the CMS export array. Every field is
//! optional because the export is not consistent about what it emits; the
//! ingest pipeline decides which absences are fatal for a given record.
//! [`CanonicalRecord`] is what the normalizer produces and what gets mapped
//! onto a knowledge-base resource.

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Review state that qualifies a record for publication
pub const PUBLISHED: &str = "published";

/// Content type used for empty or missing bodies
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// One element of the CMS export, as exported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Absolute URL of the content item
    #[serde(rename = "@id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Stable CMS identifier, used as the remote slug
    #[serde(rename = "UID", skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form tags; the export leaves blank and null entries in here
    #[serde(
        default,
        deserialize_with = "strings_only",
        skip_serializing_if = "Option::is_none"
    )]
    pub subjects: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextBody>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<ImageRef>,

    /// Only present on the trailer the exporter appends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unexported_paths: Option<Vec<serde_json::Value>>,
}

impl RawRecord {
    /// The trailer lists paths the exporter failed to serialize. It has no
    /// `@id` and is pipeline metadata, not content.
    pub fn is_trailer(&self) -> bool {
        self.id.is_none() && self.unexported_paths.is_some()
    }

    /// Number of unexported paths carried by a trailer record
    pub fn unexported_count(&self) -> usize {
        self.unexported_paths.as_ref().map_or(0, Vec::len)
    }

    pub fn is_published(&self) -> bool {
        self.review_state.as_deref() == Some(PUBLISHED)
    }

    /// Reference used when reporting this record in logs and summaries
    pub fn record_ref(&self) -> RecordRef {
        RecordRef {
            uid: self.uid.clone(),
            id: self.id.clone(),
        }
    }
}

/// Keep the string entries of an array, dropping nulls and anything else
fn strings_only<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(values.map(|values| {
        values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect()
    }))
}

/// Rich-text body attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub data: String,

    #[serde(rename = "content-type", default = "default_content_type")]
    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl TextBody {
    /// Placeholder used when the export has no body for a record
    pub fn empty() -> Self {
        Self {
            data: String::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            encoding: None,
        }
    }
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

/// Reference to an image resource in the CMS
///
/// Some exports carry image stubs with only a title; those have no `@id`
/// and yield no thumbnail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Language inferred from a record's URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Capitalized first path segment, e.g. "Vietnamese"
    pub title: String,
    /// Language code, e.g. "vi"
    pub token: String,
}

/// A record after normalization, ready to be mapped onto a remote resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "UID")]
    pub uid: String,

    pub title: String,

    /// `None` when the export had a blank description
    pub description: Option<String>,

    pub subjects: Vec<String>,

    pub effective: Option<DateTime<Utc>>,

    pub modified: Option<DateTime<Utc>>,

    pub language: Language,

    pub language_service: String,

    pub text: TextBody,

    pub thumbnail: Option<String>,
}

/// Identifies a record in failure reports
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    pub uid: Option<String>,
    pub id: Option<String>,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uid={} id={}",
            self.uid.as_deref().unwrap_or("-"),
            self.id.as_deref().unwrap_or("-")
        )
    }
}

/// An export element that is valid JSON but can't be read as a record
///
/// Carries whatever identifying fields could still be read, so the drivers
/// can count and report it like any other record instead of ending the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// Position of the element in the export array
    pub index: usize,
    pub record: RecordRef,
    pub published: bool,
    /// `MissingField` or `Decode`
    pub kind: ErrorKind,
    pub message: String,
}

impl MalformedRecord {
    pub fn from_value(index: usize, value: &Value, error: &serde_json::Error) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let message = error.to_string();
        let kind = if message.starts_with("missing field") {
            ErrorKind::MissingField
        } else {
            ErrorKind::Decode
        };

        Self {
            index,
            record: RecordRef {
                uid: text("UID"),
                id: text("@id"),
            },
            published: text("review_state").as_deref() == Some(PUBLISHED),
            kind,
            message,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_content_record() {
        let json = r#"{
            "@id": "https://www.rfa.org/vietnamese/news/story-1.html",
            "UID": "abc123",
            "title": "Story",
            "description": "  ",
            "subjects": ["Politics", "", " "],
            "review_state": "published",
            "effective": "2019-05-01T12:00:00+00:00",
            "modified": "2019-05-02T08:30:00",
            "text": {"data": "<p>hi</p>", "content-type": "text/html", "encoding": "utf-8"},
            "featured_image": {"@id": "https://www.rfa.org/img/photo.jpg", "title": "x"},
            "language": null
        }"#;

        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.uid.as_deref(), Some("abc123"));
        assert_eq!(record.subjects.as_ref().unwrap().len(), 3);
        assert_eq!(record.text.as_ref().unwrap().data, "<p>hi</p>");
        assert_eq!(
            record.featured_image.as_ref().unwrap().id.as_deref(),
            Some("https://www.rfa.org/img/photo.jpg")
        );
        assert!(record.is_published());
        assert!(!record.is_trailer());
    }

    #[test]
    fn test_null_text_is_absent() {
        let record: RawRecord =
            serde_json::from_str(r#"{"@id": "https://www.rfa.org/x", "text": null}"#).unwrap();
        assert!(record.text.is_none());
    }

    #[test]
    fn test_trailer_detection() {
        let record: RawRecord =
            serde_json::from_str(r#"{"unexported_paths": ["/a", "/b"]}"#).unwrap();
        assert!(record.is_trailer());
        assert_eq!(record.unexported_count(), 2);
        assert!(!record.is_published());
    }

    #[test]
    fn test_record_with_id_is_never_trailer() {
        let record: RawRecord =
            serde_json::from_str(r#"{"@id": "https://www.rfa.org/x", "unexported_paths": []}"#)
                .unwrap();
        assert!(!record.is_trailer());
    }

    #[test]
    fn test_text_body_defaults_content_type() {
        let body: TextBody = serde_json::from_str(r#"{"data": "x"}"#).unwrap();
        assert_eq!(body.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_record_ref_display() {
        let r = RecordRef {
            uid: Some("u1".into()),
            id: None,
        };
        assert_eq!(r.to_string(), "uid=u1 id=-");
    }

    #[test]
    fn test_lenient_subjects_and_image() {
        let json = r#"{
            "@id": "https://www.rfa.org/x",
            "subjects": ["Politics", null, 3, "Economy"],
            "featured_image": {"title": "stub"}
        }"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.subjects.unwrap(), vec!["Politics", "Economy"]);
        assert_eq!(record.featured_image.unwrap().id, None);

        let record: RawRecord = serde_json::from_str(r#"{"@id": "x", "subjects": null}"#).unwrap();
        assert!(record.subjects.is_none());
    }

    #[test]
    fn test_malformed_record_keeps_identifiers() {
        let value = serde_json::json!({
            "@id": "https://www.rfa.org/lao/a.html",
            "UID": "u1",
            "review_state": "published",
            "title": 42
        });
        let error = RawRecord::deserialize(&value).unwrap_err();
        let bad = MalformedRecord::from_value(7, &value, &error);

        assert_eq!(bad.index, 7);
        assert_eq!(bad.record.uid.as_deref(), Some("u1"));
        assert!(bad.published);
        assert_eq!(bad.kind, ErrorKind::Decode);
    }

    #[test]
    fn test_malformed_record_missing_field_kind() {
        #[derive(Debug, Deserialize)]
        struct NeedsTitle {
            #[allow(dead_code)]
            title: String,
        }

        let value = serde_json::json!({"@id": "x", "review_state": "private"});
        let error = NeedsTitle::deserialize(&value).unwrap_err();
        let bad = MalformedRecord::from_value(0, &value, &error);
        assert_eq!(bad.kind, ErrorKind::MissingField);
        assert_eq!(bad.record.id.as_deref(), Some("x"));
        assert!(!bad.published);
    }
}
