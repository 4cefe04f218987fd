//! Record normalization
//!
//! Turns one [`RawRecord`] into a [`CanonicalRecord`]. Pure and deterministic:
//! no I/O, and running it twice on the same input gives identical output.
//!
//! Steps, in order:
//! 1. Collapse staging hosts in `@id` to the production host of the publisher
//! 2. Blank descriptions become absent
//! 3. Drop blank subjects
//! 4. Infer the language from the first path segment of the rewritten `@id`
//! 5. Derive the language-service label
//! 6. Default a missing body to an empty HTML body
//! 7. Derive the thumbnail URL from the featured image

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use kbm_common::{CanonicalRecord, Language, RawRecord, TextBody};
use thiserror::Error;
use url::Url;

/// Appended to a featured image URL to address its thumbnail scale
pub const THUMBNAIL_SUFFIX: &str = "/@@images/image/thumb";

/// Language code used when the URL doesn't name a known language
pub const DEFAULT_LANGUAGE_CODE: &str = "en";

/// Label used when the URL doesn't name a known language service
pub const UNKNOWN_LABEL: &str = "unknown";

/// Label for English content from the secondary publisher
pub const SECONDARY_PUBLISHER_LABEL: &str = "BenarNews";

/// Publishers whose content lives in the export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publisher {
    Rfa,
    BenarNews,
}

struct HostFamily {
    /// Any host equal to or under this domain belongs to the family
    domain: &'static str,
    /// Production host that staging hosts in this family collapse onto;
    /// `None` for production domains, whose hosts are kept as they are
    canonical_host: Option<&'static str>,
    publisher: Publisher,
}

const HOST_FAMILIES: &[HostFamily] = &[
    HostFamily {
        domain: "rfaweb.org",
        canonical_host: Some("www.rfa.org"),
        publisher: Publisher::Rfa,
    },
    HostFamily {
        domain: "rfa.org",
        canonical_host: None,
        publisher: Publisher::Rfa,
    },
    HostFamily {
        domain: "benarnews.org",
        canonical_host: Some("www.benarnews.org"),
        publisher: Publisher::BenarNews,
    },
];

/// One language service: URL segment, language code, display label
struct LanguageEntry {
    segment: &'static str,
    code: &'static str,
    label: &'static str,
}

const LANGUAGES: &[LanguageEntry] = &[
    LanguageEntry {
        segment: "english",
        code: "en",
        label: "English",
    },
    LanguageEntry {
        segment: "burmese",
        code: "my",
        label: "Burmese",
    },
    LanguageEntry {
        segment: "cantonese",
        code: "yue",
        label: "Cantonese",
    },
    LanguageEntry {
        segment: "khmer",
        code: "km",
        label: "Khmer",
    },
    LanguageEntry {
        segment: "korean",
        code: "ko",
        label: "Korean",
    },
    LanguageEntry {
        segment: "lao",
        code: "lo",
        label: "Lao",
    },
    LanguageEntry {
        segment: "mandarin",
        code: "zh",
        label: "Mandarin",
    },
    LanguageEntry {
        segment: "tibetan",
        code: "bo",
        label: "Tibetan",
    },
    LanguageEntry {
        segment: "uyghur",
        code: "ug",
        label: "Uyghur",
    },
    LanguageEntry {
        segment: "vietnamese",
        code: "vi",
        label: "Vietnamese",
    },
    LanguageEntry {
        segment: "bengali",
        code: "bn",
        label: "Bengali",
    },
    LanguageEntry {
        segment: "indonesian",
        code: "id",
        label: "Indonesian",
    },
    LanguageEntry {
        segment: "malay",
        code: "ms",
        label: "Malay",
    },
    LanguageEntry {
        segment: "thai",
        code: "th",
        label: "Thai",
    },
];

/// A record that can't be normalized because it can't be addressed remotely
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("record is missing required field '{0}'")]
    MissingField(&'static str),
}

fn family_of(host: &str) -> Option<&'static HostFamily> {
    HOST_FAMILIES.iter().find(|family| {
        host == family.domain
            || host
                .strip_suffix(family.domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Publisher inferred from a URL's host, if it belongs to a known family
pub fn publisher_of(url: &str) -> Option<Publisher> {
    let parsed = Url::parse(url).ok()?;
    family_of(parsed.host_str()?).map(|family| family.publisher)
}

/// Collapse staging hosts onto the publisher's production host
///
/// Only the host changes. Production hosts (including other `rfa.org`
/// subdomains), hosts outside the known families and URLs that don't parse
/// are returned unchanged.
pub fn rewrite_host(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let Some(canonical) = parsed
        .host_str()
        .and_then(family_of)
        .and_then(|family| family.canonical_host)
    else {
        return url.to_string();
    };
    if parsed.host_str() == Some(canonical) || parsed.set_host(Some(canonical)).is_err() {
        return url.to_string();
    }
    parsed.to_string()
}

fn first_segment(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next().map(str::to_string))
        })
        .unwrap_or_default()
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn lookup(segment: &str) -> Option<&'static LanguageEntry> {
    let segment = segment.to_lowercase();
    LANGUAGES.iter().find(|entry| entry.segment == segment)
}

/// Infer the record language from the first path segment of its URL
pub fn infer_language(url: &str) -> Language {
    let segment = first_segment(url);
    Language {
        title: capitalize(&segment),
        token: lookup(&segment)
            .map_or(DEFAULT_LANGUAGE_CODE, |entry| entry.code)
            .to_string(),
    }
}

/// Human label of the language service that published a URL
pub fn language_service_label(url: &str) -> String {
    let segment = first_segment(url);
    if publisher_of(url) == Some(Publisher::BenarNews) && segment.eq_ignore_ascii_case("english") {
        return SECONDARY_PUBLISHER_LABEL.to_string();
    }
    lookup(&segment)
        .map_or(UNKNOWN_LABEL, |entry| entry.label)
        .to_string()
}

/// Parse an export timestamp; "None", blanks and garbage become absent
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Normalize one exported record
pub fn normalize(raw: &RawRecord) -> Result<CanonicalRecord, NormalizeError> {
    let source_id = raw.id.as_deref().ok_or(NormalizeError::MissingField("@id"))?;
    let uid = raw
        .uid
        .as_deref()
        .filter(|uid| !is_blank(uid))
        .ok_or(NormalizeError::MissingField("UID"))?;

    let id = rewrite_host(source_id);

    let description = raw
        .description
        .as_deref()
        .filter(|d| !is_blank(d))
        .map(str::to_string);

    let subjects = raw
        .subjects
        .iter()
        .flatten()
        .filter(|s| !is_blank(s))
        .cloned()
        .collect();

    let language = infer_language(&id);
    let language_service = language_service_label(&id);

    let text = raw.text.clone().unwrap_or_else(TextBody::empty);

    let thumbnail = raw
        .featured_image
        .as_ref()
        .and_then(|image| image.id.as_deref())
        .map(|image| {
            rewrite_host(&format!(
                "{}{}",
                image.trim_end_matches('/'),
                THUMBNAIL_SUFFIX
            ))
        });

    Ok(CanonicalRecord {
        id,
        uid: uid.to_string(),
        title: raw.title.clone().unwrap_or_default(),
        description,
        subjects,
        effective: raw.effective.as_deref().and_then(parse_timestamp),
        modified: raw.modified.as_deref().and_then(parse_timestamp),
        language,
        language_service,
        text,
        thumbnail,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use kbm_common::ImageRef;
    use proptest::prelude::*;

    fn raw(id: &str) -> RawRecord {
        RawRecord {
            id: Some(id.to_string()),
            uid: Some("uid-1".to_string()),
            title: Some("A story".to_string()),
            review_state: Some("published".to_string()),
            ..Default::default()
        }
    }

    /// Feed a canonical record back through the normalizer
    fn as_raw(canonical: &CanonicalRecord, source: &RawRecord) -> RawRecord {
        RawRecord {
            id: Some(canonical.id.clone()),
            uid: Some(canonical.uid.clone()),
            title: Some(canonical.title.clone()),
            description: canonical.description.clone(),
            subjects: Some(canonical.subjects.clone()),
            review_state: source.review_state.clone(),
            effective: canonical.effective.map(|d| d.to_rfc3339()),
            modified: canonical.modified.map(|d| d.to_rfc3339()),
            text: Some(canonical.text.clone()),
            featured_image: source.featured_image.clone(),
            unexported_paths: None,
        }
    }

    #[test]
    fn test_rewrite_staging_hosts() {
        assert_eq!(rewrite_host("https://staging.rfaweb.org/x"), "https://www.rfa.org/x");
        assert_eq!(
            rewrite_host("https://viedevview.rfaweb.org/vietnamese/a.html"),
            "https://www.rfa.org/vietnamese/a.html"
        );
        assert_eq!(
            rewrite_host("https://foo.benarnews.org/y"),
            "https://www.benarnews.org/y"
        );
        assert_eq!(
            rewrite_host("http://staging.rfaweb.org:8080/x?a=1"),
            "http://www.rfa.org:8080/x?a=1"
        );
    }

    #[test]
    fn test_rewrite_leaves_other_hosts_alone() {
        assert_eq!(rewrite_host("https://example.com/x"), "https://example.com/x");
        assert_eq!(rewrite_host("https://notrfaweb.org/x"), "https://notrfaweb.org/x");
        assert_eq!(rewrite_host("https://www.rfa.org/x"), "https://www.rfa.org/x");
        assert_eq!(
            rewrite_host("https://media.rfa.org/img/a.jpg"),
            "https://media.rfa.org/img/a.jpg"
        );
        assert_eq!(rewrite_host("http://rfa.org/x"), "http://rfa.org/x");
        assert_eq!(rewrite_host("not a url"), "not a url");
    }

    #[test]
    fn test_language_inference() {
        let lang = infer_language("https://www.rfa.org/vietnamese/news/a.html");
        assert_eq!(lang.token, "vi");
        assert_eq!(lang.title, "Vietnamese");
        assert_eq!(
            language_service_label("https://www.rfa.org/vietnamese/news/a.html"),
            "Vietnamese"
        );

        let unknown = infer_language("https://www.rfa.org/xyz/a.html");
        assert_eq!(unknown.token, "en");
        assert_eq!(unknown.title, "Xyz");
        assert_eq!(language_service_label("https://www.rfa.org/xyz/a.html"), "unknown");
    }

    #[test]
    fn test_secondary_publisher_label() {
        assert_eq!(
            language_service_label("https://www.benarnews.org/english/news/a.html"),
            SECONDARY_PUBLISHER_LABEL
        );
        assert_eq!(
            language_service_label("https://www.rfa.org/english/news/a.html"),
            "English"
        );
        assert_eq!(
            language_service_label("https://www.benarnews.org/bengali/news/a.html"),
            "Bengali"
        );
    }

    #[test]
    fn test_normalize_full_record() {
        let mut record = raw("https://staging.rfaweb.org/burmese/news/a.html");
        record.description = Some("   \n".to_string());
        record.subjects = Some(vec![
            "Politics".into(),
            "".into(),
            "  ".into(),
            "Economy".into(),
        ]);
        record.effective = Some("2019-05-01T12:00:00+07:00".to_string());
        record.modified = Some("None".to_string());
        record.featured_image = Some(ImageRef {
            id: Some("https://staging.rfaweb.org/burmese/news/a.html/photo.jpg".to_string()),
        });

        let canonical = normalize(&record).unwrap();
        assert_eq!(canonical.id, "https://www.rfa.org/burmese/news/a.html");
        assert_eq!(canonical.uid, "uid-1");
        assert_eq!(canonical.description, None);
        assert_eq!(canonical.subjects, vec!["Politics", "Economy"]);
        assert_eq!(canonical.language.token, "my");
        assert_eq!(canonical.language_service, "Burmese");
        assert_eq!(canonical.text, TextBody::empty());
        assert_eq!(
            canonical.thumbnail.as_deref(),
            Some("https://www.rfa.org/burmese/news/a.html/photo.jpg/@@images/image/thumb")
        );
        assert_eq!(
            canonical.effective.unwrap().to_rfc3339(),
            "2019-05-01T05:00:00+00:00"
        );
        assert_eq!(canonical.modified, None);
    }

    #[test]
    fn test_image_without_id_has_no_thumbnail() {
        let mut record = raw("https://www.rfa.org/lao/a.html");
        record.featured_image = Some(ImageRef::default());
        assert_eq!(normalize(&record).unwrap().thumbnail, None);
    }

    #[test]
    fn test_missing_identifiers() {
        let mut record = raw("https://www.rfa.org/lao/a.html");
        record.uid = None;
        assert_eq!(normalize(&record), Err(NormalizeError::MissingField("UID")));

        let mut record = raw("https://www.rfa.org/lao/a.html");
        record.id = None;
        assert_eq!(normalize(&record), Err(NormalizeError::MissingField("@id")));
    }

    #[test]
    fn test_timestamps() {
        assert!(parse_timestamp("2020-01-02T03:04:05").is_some());
        assert!(parse_timestamp("2020-01-02T03:04:05.123456").is_some());
        assert!(parse_timestamp("2020-01-02").is_some());
        assert!(parse_timestamp("None").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let mut record = raw("https://foo.benarnews.org/english/a.html");
        record.subjects = Some(vec!["x".into(), " ".into()]);
        let a = serde_json::to_vec(&normalize(&record).unwrap()).unwrap();
        let b = serde_json::to_vec(&normalize(&record).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            host in prop::sample::select(vec![
                "staging.rfaweb.org", "www.rfa.org", "foo.benarnews.org", "example.com",
            ]),
            segment in "[a-z]{1,10}",
            subjects in prop::collection::vec("[ a-zA-Z]{0,6}", 0..6),
            description in prop::option::of("[ a-z]{0,8}"),
        ) {
            let mut record = raw(&format!("https://{}/{}/story.html", host, segment));
            record.subjects = Some(subjects);
            record.description = description;

            let once = normalize(&record).unwrap();
            let twice = normalize(&as_raw(&once, &record)).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_subjects_never_blank(subjects in prop::collection::vec("[ \\ta-z]{0,5}", 0..8)) {
            let mut record = raw("https://www.rfa.org/khmer/a.html");
            record.subjects = Some(subjects.clone());
            let canonical = normalize(&record).unwrap();
            prop_assert!(canonical.subjects.iter().all(|s| !s.trim().is_empty()));
            let expected: Vec<_> = subjects.into_iter().filter(|s| !s.trim().is_empty()).collect();
            prop_assert_eq!(canonical.subjects, expected);
        }
    }
}
