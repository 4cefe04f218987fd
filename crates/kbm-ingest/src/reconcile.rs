//! Removal of remote resources whose source record is no longer published
//!
//! The export is the source of truth. The pass never lists the remote
//! collection; it deletes by slug for every unpublished record and treats
//! "not found" as already reconciled.

use crate::config::RunConfig;
use crate::pacing::Pacer;
use crate::progress::ProgressTracker;
use crate::remote::{KnowledgeBase, ResourceKey};
use crate::stream::{Entry, RecordStream};
use crate::validator::validate;
use kbm_common::{ErrorKind, RecordRef, Result};
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Progress is logged once per this many processed records
pub const PROGRESS_EVERY: usize = 50;

/// End-of-run totals for a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Unpublished records handled
    pub processed: usize,
    pub deleted: usize,
    /// Resource was already absent remotely
    pub not_found: usize,
    /// Deletes suppressed by `--fake-it`
    pub faked: usize,
    pub failures: BTreeMap<ErrorKind, Vec<RecordRef>>,
}

impl ReconcileReport {
    pub fn failed(&self) -> usize {
        self.failures.values().map(Vec::len).sum()
    }

    fn fail(&mut self, kind: ErrorKind, record: RecordRef) {
        self.failures.entry(kind).or_default().push(record);
    }

    pub fn log_summary(&self) {
        info!(
            processed = self.processed,
            deleted = self.deleted,
            not_found = self.not_found,
            faked = self.faked,
            failed = self.failed(),
            "reconciliation finished"
        );
        for (kind, records) in &self.failures {
            warn!(kind = %kind, count = records.len(), "failed deletes");
            for record in records {
                warn!(kind = %kind, "  {}", record);
            }
        }
    }
}

/// Deletes remote copies of unpublished records
pub struct ReconciliationDriver<'a, K: ?Sized> {
    config: &'a RunConfig,
    kb: &'a K,
}

impl<'a, K: KnowledgeBase + ?Sized> ReconciliationDriver<'a, K> {
    pub fn new(config: &'a RunConfig, kb: &'a K) -> Self {
        Self { config, kb }
    }

    pub async fn run(&self) -> Result<ReconcileReport> {
        let config = self.config;
        info!(
            source = %config.source.display(),
            target = %config.target.name,
            fake_it = config.fake_it,
            "validating export"
        );
        let summary = validate(&config.source)?;
        info!(
            total = summary.total,
            unpublished = summary.unpublished,
            "starting reconciliation"
        );

        let mut tracker = ProgressTracker::new(summary.unpublished, 0);
        let mut report = ReconcileReport::default();
        let mut pacer = Pacer::new(config.min_interval);

        for item in RecordStream::open(&config.source)? {
            // Deleting only needs the identifiers, which a mistyped record
            // usually still carries
            let entry = Entry::from_item(item)?;
            let record = entry.record_ref();
            if record.id.is_none() || entry.is_published() {
                continue;
            }

            let started = Instant::now();
            report.processed += 1;
            self.reconcile(&record, &mut pacer, &mut report).await;
            tracker.record_iteration(started.elapsed());

            if report.processed % PROGRESS_EVERY == 0 {
                info!("{}", tracker.report());
            }
        }

        report.log_summary();
        Ok(report)
    }

    async fn reconcile(
        &self,
        record: &RecordRef,
        pacer: &mut Pacer,
        report: &mut ReconcileReport,
    ) {
        let Some(uid) = record.uid.as_deref().filter(|uid| !uid.trim().is_empty()) else {
            warn!(%record, "unpublished record has no UID; cannot delete");
            report.fail(ErrorKind::MissingField, record.clone());
            return;
        };

        if self.config.fake_it {
            debug!(slug = uid, "fake-it: delete suppressed");
            report.faked += 1;
            return;
        }

        pacer.wait().await;
        match self
            .kb
            .delete(&self.config.target, &ResourceKey::slug(uid))
            .await
        {
            Ok(()) => {
                debug!(slug = uid, "deleted");
                report.deleted += 1;
            }
            Err(e) if e.is_not_found() => {
                debug!(slug = uid, "already absent");
                report.not_found += 1;
            }
            Err(e) => {
                warn!(kind = %e.kind, %record, "delete failed: {}", e.message);
                report.fail(e.kind, record.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_sums_buckets() {
        let mut report = ReconcileReport::default();
        report.fail(ErrorKind::Server, RecordRef::default());
        report.fail(ErrorKind::Network, RecordRef::default());
        report.fail(ErrorKind::Server, RecordRef::default());
        assert_eq!(report.failed(), 3);
        assert_eq!(report.failures.len(), 2);
    }
}
