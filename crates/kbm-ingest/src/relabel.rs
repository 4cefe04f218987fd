//! Repair of resources classified under the legacy labelset name
//!
//! Early loads used `language-service` as the labelset; the current name is
//! [`LANGUAGE_SERVICE_LABELSET`]. Each affected resource is fetched, its
//! classifications renamed, and written back by resource id.

use crate::config::Target;
use crate::pacing::Pacer;
use crate::remote::{
    KnowledgeBase, ResourceKey, ResourcePayload, SearchQuery, UserMetadata,
    LANGUAGE_SERVICE_LABELSET,
};
use kbm_common::{ErrorKind, Result};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Labelset name written by earlier loads
pub const LEGACY_LABELSET: &str = "language-service";

/// Which resources to repair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelabelScope {
    One(ResourceKey),
    /// Everything a labelset search for the legacy name returns
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelabelReport {
    pub edited: usize,
    /// Already carried the current labelset name
    pub unchanged: usize,
    pub faked: usize,
    /// Resource keys that failed, by kind
    pub failures: BTreeMap<ErrorKind, Vec<String>>,
}

impl RelabelReport {
    pub fn failed(&self) -> usize {
        self.failures.values().map(Vec::len).sum()
    }
}

/// Rename legacy classifications; `None` when there is nothing to rename
pub fn relabel_classifications(metadata: &UserMetadata) -> Option<UserMetadata> {
    if !metadata
        .classifications
        .iter()
        .any(|c| c.labelset == LEGACY_LABELSET)
    {
        return None;
    }

    let mut fixed = metadata.clone();
    for classification in &mut fixed.classifications {
        if classification.labelset == LEGACY_LABELSET {
            classification.labelset = LANGUAGE_SERVICE_LABELSET.to_string();
        }
    }
    Some(fixed)
}

/// Rewrites legacy labelsets on one or all resources of a target
pub struct Relabeler<'a, K: ?Sized> {
    kb: &'a K,
    target: &'a Target,
    fake_it: bool,
    pacer: Pacer,
}

impl<'a, K: KnowledgeBase + ?Sized> Relabeler<'a, K> {
    pub fn new(
        kb: &'a K,
        target: &'a Target,
        fake_it: bool,
        min_interval: Option<Duration>,
    ) -> Self {
        Self {
            kb,
            target,
            fake_it,
            pacer: Pacer::new(min_interval),
        }
    }

    /// Repair every resource in `scope`
    ///
    /// Failing to find the resources at all (the single get, or the search)
    /// is fatal; failures on individual resources are bucketed.
    pub async fn run(&mut self, scope: &RelabelScope) -> Result<RelabelReport> {
        let mut report = RelabelReport::default();

        match scope {
            RelabelScope::One(key) => {
                self.pacer.wait().await;
                let resource = self.kb.get(self.target, key).await?;
                self.repair(&resource.id, resource.usermetadata.as_ref(), &mut report)
                    .await;
            }
            RelabelScope::All => {
                self.pacer.wait().await;
                let hits = self
                    .kb
                    .search(self.target, &SearchQuery::labelset(LEGACY_LABELSET))
                    .await?;
                info!(
                    count = hits.len(),
                    target = %self.target.name,
                    "resources with legacy labelset"
                );

                for hit in hits {
                    self.pacer.wait().await;
                    match self.kb.get(self.target, &ResourceKey::id(&hit.id)).await {
                        Ok(resource) => {
                            let metadata = resource.usermetadata.as_ref();
                            self.repair(&resource.id, metadata, &mut report).await;
                        }
                        Err(e) => {
                            warn!(rid = %hit.id, kind = %e.kind, "fetch failed: {}", e.message);
                            report.failures.entry(e.kind).or_default().push(hit.id);
                        }
                    }
                }
            }
        }

        info!(
            edited = report.edited,
            unchanged = report.unchanged,
            faked = report.faked,
            failed = report.failed(),
            "relabel finished"
        );
        Ok(report)
    }

    async fn repair(
        &mut self,
        rid: &str,
        metadata: Option<&UserMetadata>,
        report: &mut RelabelReport,
    ) {
        let Some(fixed) = metadata.and_then(relabel_classifications) else {
            debug!(rid, "no legacy labels");
            report.unchanged += 1;
            return;
        };

        if self.fake_it {
            debug!(rid, "fake-it: relabel suppressed");
            report.faked += 1;
            return;
        }

        let payload = ResourcePayload {
            usermetadata: Some(fixed),
            ..Default::default()
        };
        self.pacer.wait().await;
        match self
            .kb
            .update(self.target, &ResourceKey::id(rid), &payload)
            .await
        {
            Ok(()) => {
                debug!(rid, "relabelled");
                report.edited += 1;
            }
            Err(e) => {
                warn!(rid, kind = %e.kind, "relabel failed: {}", e.message);
                report.failures.entry(e.kind).or_default().push(rid.to_string());
            }
        }
    }
}
