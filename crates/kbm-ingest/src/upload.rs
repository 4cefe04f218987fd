//! Main upload pass
//!
//! One run is a validation pre-pass (for totals) followed by a single
//! streaming pass. Every record in the streaming pass goes through the same
//! gates in order:
//!
//! 1. trailer records are skipped without counting
//! 2. unpublished records are skipped without counting
//! 3. records below the resume point are counted and skipped
//! 4. once `max_uploads` records are counted the run stops
//! 5. everything else is normalized and written
//!
//! A failed write is bucketed by [`ErrorKind`] and the run moves on, and so is
//! a published record that couldn't be read. Failed records still advance
//! the count, so the count logged for a record is
//! always its position among published records and can be passed back as
//! `--resume-at`.

use crate::config::{RunConfig, WriteMode};
use crate::normalizer::normalize;
use crate::pacing::Pacer;
use crate::progress::ProgressTracker;
use crate::remote::{upsert, KnowledgeBase, ResourceKey, ResourcePayload, UpsertOutcome};
use crate::stream::{Entry, RecordStream};
use crate::validator::validate;
use kbm_common::{ErrorKind, MalformedRecord, RawRecord, RecordRef, RemoteError, Result};
use std::collections::BTreeMap;
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What a single write did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
    /// Origin metadata edited on an existing resource
    Edited,
    /// Everything but the remote call ran (`--fake-it`)
    Faked,
}

impl From<UpsertOutcome> for RecordOutcome {
    fn from(outcome: UpsertOutcome) -> Self {
        match outcome {
            UpsertOutcome::Created => RecordOutcome::Created,
            UpsertOutcome::Updated => RecordOutcome::Updated,
        }
    }
}

/// A record that could not be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub kind: ErrorKind,
    pub record: RecordRef,
    pub message: String,
}

impl RecordFailure {
    fn remote(record: RecordRef, error: RemoteError) -> Self {
        Self {
            kind: error.kind,
            record,
            message: error.message,
        }
    }
}

impl From<&MalformedRecord> for RecordFailure {
    fn from(bad: &MalformedRecord) -> Self {
        Self {
            kind: bad.kind,
            record: bad.record.clone(),
            message: bad.message.clone(),
        }
    }
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.record, self.kind, self.message)
    }
}

impl From<RecordFailure> for RemoteError {
    fn from(failure: RecordFailure) -> Self {
        RemoteError::new(failure.kind, format!("{}: {}", failure.record, failure.message))
    }
}

/// End-of-run totals for an upload pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub created: usize,
    pub updated: usize,
    pub edited: usize,
    pub faked: usize,
    pub failed: usize,
    pub skipped_unpublished: usize,
    pub skipped_resume: usize,
    pub trailers: usize,
    /// Count after the last record handled; the value to resume from
    pub last_count: usize,
    pub stopped_at_limit: bool,
    pub failures: BTreeMap<ErrorKind, Vec<RecordRef>>,
}

impl UploadReport {
    /// Records that reached the remote service (or would have, when faking)
    pub fn written(&self) -> usize {
        self.created + self.updated + self.edited + self.faked
    }

    fn note(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Created => self.created += 1,
            RecordOutcome::Updated => self.updated += 1,
            RecordOutcome::Edited => self.edited += 1,
            RecordOutcome::Faked => self.faked += 1,
        }
    }

    fn fail(&mut self, failure: RecordFailure) {
        self.failed += 1;
        self.failures.entry(failure.kind).or_default().push(failure.record);
    }

    /// Log the summary and the failure buckets
    pub fn log_summary(&self) {
        info!(
            created = self.created,
            updated = self.updated,
            edited = self.edited,
            faked = self.faked,
            failed = self.failed,
            skipped_unpublished = self.skipped_unpublished,
            skipped_resume = self.skipped_resume,
            trailers = self.trailers,
            stopped_at_limit = self.stopped_at_limit,
            "upload finished"
        );
        for (kind, records) in &self.failures {
            warn!(kind = %kind, count = records.len(), "failed records");
            for record in records {
                warn!(kind = %kind, "  {}", record);
            }
        }
        info!(
            last_count = self.last_count,
            "last processed count {}; rerun with --resume-at {} to continue",
            self.last_count,
            self.last_count
        );
    }
}

/// Streams an export into a knowledge base
pub struct UploadDriver<'a, K: ?Sized> {
    config: &'a RunConfig,
    kb: &'a K,
}

impl<'a, K: KnowledgeBase + ?Sized> UploadDriver<'a, K> {
    pub fn new(config: &'a RunConfig, kb: &'a K) -> Self {
        Self { config, kb }
    }

    /// Run the validation pre-pass and then the upload pass
    pub async fn run(&self) -> Result<UploadReport> {
        let config = self.config;
        info!(
            source = %config.source.display(),
            target = %config.target.name,
            mode = %config.mode,
            fake_it = config.fake_it,
            "validating export"
        );
        let summary = validate(&config.source)?;
        let target = config
            .max_uploads
            .map_or(summary.published(), |max| max.min(summary.published()));
        info!(
            total = summary.total,
            published = summary.published(),
            malformed = summary.malformed,
            target,
            resume_at = config.resume_at,
            "starting upload"
        );

        let mut tracker = ProgressTracker::new(target, config.resume_at);
        let mut report = UploadReport::default();
        let mut pacer = Pacer::new(config.min_interval);

        for item in RecordStream::open(&config.source)? {
            let entry = Entry::from_item(item)?;

            if entry.is_trailer() {
                report.trailers += 1;
                continue;
            }
            if !entry.is_published() {
                report.skipped_unpublished += 1;
                continue;
            }
            if tracker.skipping() {
                tracker.skip();
                report.skipped_resume += 1;
                info!(
                    "{} | skipping up to {}/{}",
                    entry.record_ref(),
                    tracker.count(),
                    config.resume_at
                );
                continue;
            }
            if let Some(max) = config.max_uploads {
                if tracker.count() >= max {
                    info!(max, "upload limit reached");
                    report.stopped_at_limit = true;
                    break;
                }
            }

            let started = Instant::now();
            let result = match &entry {
                Entry::Record(raw) => self.write(raw, &mut pacer).await,
                Entry::Malformed(bad) => Err(RecordFailure::from(bad)),
            };
            match result {
                Ok(outcome) => {
                    debug!(record = %entry.record_ref(), ?outcome, "record written");
                    report.note(outcome);
                }
                Err(failure) => {
                    warn!(kind = %failure.kind, "record failed: {}", failure);
                    report.fail(failure);
                }
            }
            tracker.record_iteration(started.elapsed());
            report.last_count = tracker.count();
            info!("{}", tracker.report());
        }

        report.last_count = tracker.count();
        report.log_summary();
        Ok(report)
    }

    /// Normalize one record and write it according to the run's mode
    pub async fn write(
        &self,
        raw: &RawRecord,
        pacer: &mut Pacer,
    ) -> std::result::Result<RecordOutcome, RecordFailure> {
        let record = normalize(raw).map_err(|e| RecordFailure {
            kind: ErrorKind::MissingField,
            record: raw.record_ref(),
            message: e.to_string(),
        })?;

        let payload = match self.config.mode {
            WriteMode::Upsert | WriteMode::CreateOnly => ResourcePayload::from_record(&record),
            WriteMode::EditOrigin => ResourcePayload::origin_edit(&record),
        };

        if self.config.fake_it {
            debug!(slug = %record.uid, mode = %self.config.mode, "fake-it: remote call suppressed");
            return Ok(RecordOutcome::Faked);
        }

        pacer.wait().await;
        let target = &self.config.target;
        let result = match self.config.mode {
            WriteMode::Upsert => upsert(self.kb, target, &record.uid, &payload)
                .await
                .map(RecordOutcome::from),
            WriteMode::CreateOnly => self
                .kb
                .create(target, &payload)
                .await
                .map(|_| RecordOutcome::Created),
            WriteMode::EditOrigin => self
                .kb
                .update(target, &ResourceKey::slug(&record.uid), &payload)
                .await
                .map(|()| RecordOutcome::Edited),
        };

        result.map_err(|e| RecordFailure::remote(raw.record_ref(), e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_report_buckets_failures_by_kind() {
        let mut report = UploadReport::default();
        let record = |uid: &str| RecordRef {
            uid: Some(uid.to_string()),
            id: None,
        };
        report.fail(RecordFailure {
            kind: ErrorKind::Server,
            record: record("a"),
            message: "boom".into(),
        });
        report.fail(RecordFailure {
            kind: ErrorKind::Conflict,
            record: record("b"),
            message: "exists".into(),
        });
        report.fail(RecordFailure {
            kind: ErrorKind::Server,
            record: record("c"),
            message: "boom".into(),
        });

        assert_eq!(report.failed, 3);
        assert_eq!(report.failures[&ErrorKind::Server], vec![record("a"), record("c")]);
        assert_eq!(report.failures[&ErrorKind::Conflict], vec![record("b")]);
        assert_eq!(
            report.failures.keys().next(),
            Some(&ErrorKind::Conflict)
        );
    }

    #[test]
    fn test_written_counts_every_outcome() {
        let mut report = UploadReport::default();
        for outcome in [
            RecordOutcome::Created,
            RecordOutcome::Updated,
            RecordOutcome::Edited,
            RecordOutcome::Faked,
        ] {
            report.note(outcome);
        }
        assert_eq!(report.written(), 4);
    }

    #[test]
    fn test_failure_converts_to_remote_error() {
        let failure = RecordFailure {
            kind: ErrorKind::NotFound,
            record: RecordRef {
                uid: Some("u1".into()),
                id: Some("https://www.rfa.org/lao/x".into()),
            },
            message: "gone".into(),
        };
        let error: RemoteError = failure.into();
        assert_eq!(error.kind, ErrorKind::NotFound);
        assert!(error.message.contains("uid=u1"));
    }
}
