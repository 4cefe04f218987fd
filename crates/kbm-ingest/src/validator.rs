//! Pre-pass over an export that establishes progress totals

use crate::stream::RecordStream;
use kbm_common::{KbmError, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// Counts produced by a validation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Content records (everything with an `@id`)
    pub total: usize,
    /// Content records whose review state is not "published"
    pub unpublished: usize,
    /// Paths the exporter reported as unexported in its trailer
    pub malformed: usize,
}

impl ExportSummary {
    pub fn published(&self) -> usize {
        self.total - self.unpublished
    }
}

/// Count the records in an export without holding it in memory
///
/// A record with neither `@id` nor `unexported_paths` is a broken export and
/// fails the pass rather than being miscounted. A record whose fields don't
/// have the expected types is still counted by its `@id` and review state;
/// the drivers report it when they reach it.
pub fn validate(path: impl AsRef<Path>) -> Result<ExportSummary> {
    let path = path.as_ref();
    debug!(path = %path.display(), "counting objects");

    let mut summary = ExportSummary::default();

    for (index, record) in RecordStream::open(path)?.enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(KbmError::Malformed(bad)) if bad.record.id.is_some() => {
                warn!(index, record = %bad.record, "unreadable record: {}", bad.message);
                summary.total += 1;
                if !bad.published {
                    summary.unpublished += 1;
                }
                continue;
            }
            Err(KbmError::Malformed(bad)) => {
                return Err(KbmError::MissingField {
                    index: bad.index,
                    field: "@id",
                });
            }
            Err(e) => return Err(e),
        };

        if record.id.is_some() {
            summary.total += 1;
            if !record.is_published() {
                summary.unpublished += 1;
            }
        } else if record.is_trailer() {
            summary.malformed += record.unexported_count();
        } else {
            return Err(KbmError::MissingField {
                index,
                field: "@id",
            });
        }
    }

    debug!(
        total = summary.total,
        published = summary.published(),
        malformed = summary.malformed,
        "validation complete"
    );

    Ok(summary)
}
