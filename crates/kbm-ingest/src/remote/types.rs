//! Resource payloads exchanged with the knowledge-base service

use kbm_common::CanonicalRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Labelset that carries the language-service classification
pub const LANGUAGE_SERVICE_LABELSET: &str = "Language Service";

/// How a resource is addressed: by our slug or by the service's own id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKey {
    Slug(String),
    Id(String),
}

impl ResourceKey {
    pub fn slug(slug: impl Into<String>) -> Self {
        Self::Slug(slug.into())
    }

    pub fn id(rid: impl Into<String>) -> Self {
        Self::Id(rid.into())
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKey::Slug(slug) => write!(f, "slug {}", slug),
            ResourceKey::Id(rid) => write!(f, "rid {}", rid),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub labelset: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub classifications: Vec<Classification>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextField {
    pub body: String,
    pub format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extra {
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Body of a create or update call; unset fields are left untouched on update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usermetadata: Option<UserMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texts: Option<BTreeMap<String, TextField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Extra>,
}

fn text_format(content_type: &str) -> &'static str {
    match content_type {
        "text/plain" => "PLAIN",
        "text/markdown" | "text/x-web-markdown" => "MARKDOWN",
        _ => "HTML",
    }
}

fn origin_of(record: &CanonicalRecord) -> Origin {
    Origin {
        url: Some(record.id.clone()),
        tags: record.subjects.clone(),
        created: record.effective.map(|d| d.to_rfc3339()),
        modified: record.modified.map(|d| d.to_rfc3339()),
    }
}

fn extra_of(record: &CanonicalRecord) -> Extra {
    let mut metadata = serde_json::Map::new();
    metadata.insert(
        "thumbnail".to_string(),
        record
            .thumbnail
            .clone()
            .map_or(serde_json::Value::Null, serde_json::Value::String),
    );
    Extra { metadata }
}

impl ResourcePayload {
    /// Full resource body for a create-or-update
    pub fn from_record(record: &CanonicalRecord) -> Self {
        let texts = BTreeMap::from([(
            "body".to_string(),
            TextField {
                body: record.text.data.clone(),
                format: text_format(&record.text.content_type).to_string(),
            },
        )]);

        Self {
            slug: Some(record.uid.clone()),
            title: Some(record.title.clone()),
            summary: record.description.clone(),
            origin: Some(origin_of(record)),
            metadata: Some(Metadata {
                language: Some(record.language.token.clone()),
            }),
            usermetadata: Some(UserMetadata {
                classifications: vec![Classification {
                    labelset: LANGUAGE_SERVICE_LABELSET.to_string(),
                    label: record.language_service.clone(),
                }],
            }),
            texts: Some(texts),
            extra: Some(extra_of(record)),
        }
    }

    /// Origin and thumbnail only, for editing resources already uploaded
    pub fn origin_edit(record: &CanonicalRecord) -> Self {
        Self {
            origin: Some(origin_of(record)),
            extra: Some(extra_of(record)),
            ..Default::default()
        }
    }
}

/// A resource as returned by get or search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub usermetadata: Option<UserMetadata>,
    #[serde(default)]
    pub origin: Option<Origin>,
}

/// Search request body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
}

impl SearchQuery {
    /// All resources carrying any label of `labelset`
    pub fn labelset(labelset: &str) -> Self {
        Self {
            query: String::new(),
            filters: vec![format!("/l/{}", labelset)],
        }
    }
}
