//! Single-record writes, addressed by `@id` or UID
//!
//! A linear scan: the export is read until the first match and the rest of
//! the file is never parsed.

use crate::config::RunConfig;
use crate::normalizer::rewrite_host;
use crate::pacing::Pacer;
use crate::remote::KnowledgeBase;
use crate::stream::{Entry, RecordStream};
use crate::upload::{RecordFailure, RecordOutcome, UploadDriver};
use kbm_common::{RecordRef, RemoteError, Result};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Which record to pick out of an export
///
/// A record carrying the `@id` (as exported or after host rewriting) wins;
/// the first record with the UID is the fallback when none does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSelector {
    id: Option<String>,
    uid: Option<String>,
}

impl RecordSelector {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            uid: None,
        }
    }

    pub fn by_uid(uid: impl Into<String>) -> Self {
        Self {
            id: None,
            uid: Some(uid.into()),
        }
    }

    /// Build a selector from the CLI flags; `None` when neither is given
    pub fn from_flags(id: Option<String>, uid: Option<String>) -> Option<Self> {
        if id.is_none() && uid.is_none() {
            return None;
        }
        Some(Self { id, uid })
    }

    pub fn matches_id(&self, record: &RecordRef) -> bool {
        match (&self.id, &record.id) {
            (Some(id), Some(rid)) => rid == id || rewrite_host(rid) == *id,
            _ => false,
        }
    }

    pub fn matches_uid(&self, record: &RecordRef) -> bool {
        self.uid.is_some() && record.uid == self.uid
    }

    pub fn matches(&self, record: &RecordRef) -> bool {
        self.matches_id(record) || self.matches_uid(record)
    }
}

impl fmt::Display for RecordSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.id, &self.uid) {
            (Some(id), Some(uid)) => write!(f, "@id {} or UID {}", id, uid),
            (Some(id), None) => write!(f, "@id {}", id),
            (None, Some(uid)) => write!(f, "UID {}", uid),
            (None, None) => f.write_str("no record"),
        }
    }
}

/// Stream `path` for the record `selector` picks
///
/// Stops at the first `@id` match. With only a UID to look for, stops at the
/// first UID match; otherwise a UID match is held until the end of the file
/// in case a later record carries the `@id`.
pub fn find_record(path: impl AsRef<Path>, selector: &RecordSelector) -> Result<Option<Entry>> {
    let mut fallback = None;
    for item in RecordStream::open(path)? {
        let entry = Entry::from_item(item)?;
        if entry.is_trailer() {
            continue;
        }

        let record = entry.record_ref();
        if selector.matches_id(&record) {
            return Ok(Some(entry));
        }
        if fallback.is_none() && selector.matches_uid(&record) {
            if selector.id.is_none() {
                return Ok(Some(entry));
            }
            fallback = Some(entry);
        }
    }
    Ok(fallback)
}

/// Result of a single-record run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Applied(RecordOutcome),
    /// Nothing in the export matched
    NotFound,
    /// The match is not published and was left alone
    Unpublished,
}

/// Find one record and write it with the run's mode
///
/// Nothing to do is not an error: an unmatched or unpublished record logs a
/// warning and returns normally. A failed write, or a match that
/// couldn't be read, is returned as an error.
pub async fn apply_selected<K: KnowledgeBase + ?Sized>(
    config: &RunConfig,
    kb: &K,
    selector: &RecordSelector,
) -> Result<LookupOutcome> {
    info!(source = %config.source.display(), %selector, "looking up record");

    let Some(entry) = find_record(&config.source, selector)? else {
        warn!(%selector, "no matching record found");
        return Ok(LookupOutcome::NotFound);
    };
    if !entry.is_published() {
        warn!(record = %entry.record_ref(), "record is not published; skipping");
        return Ok(LookupOutcome::Unpublished);
    }
    let raw = match entry {
        Entry::Record(raw) => raw,
        Entry::Malformed(bad) => return Err(RemoteError::from(RecordFailure::from(&bad)).into()),
    };

    let mut pacer = Pacer::new(None);
    let outcome = UploadDriver::new(config, kb)
        .write(&raw, &mut pacer)
        .await
        .map_err(RemoteError::from)?;
    info!(record = %raw.record_ref(), ?outcome, "record written");
    Ok(LookupOutcome::Applied(outcome))
}
