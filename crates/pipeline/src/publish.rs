//! Rotation of the newest frames into fixed publication slots.
//!
//! Slot `000` holds the newest frame. Frames older than the stale threshold
//! are published with a stale stamp instead of a plain copy, so a stalled
//! feed is visible to anyone watching the slots.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use loop_common::age;
use renderer::StaleStamp;
use tracing::{debug, info, instrument, warn};

use crate::atomic::{copy_atomic, partial_path, rename_or_clean};
use crate::product::RenderedArtifact;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub copied: usize,
    pub stamped: usize,
    pub failed: usize,
    /// Slots with no artifact this cycle; they keep their previous content
    pub unassigned_slots: usize,
    pub latest: Option<PathBuf>,
}

pub fn slot_path(dest_dir: &Path, base_name: &str, slot: usize) -> PathBuf {
    dest_dir.join(format!("{}_{:03}.png", base_name, slot))
}

pub fn latest_path(dest_dir: &Path, base_name: &str) -> PathBuf {
    dest_dir.join(format!("{}_latest.png", base_name))
}

/// Publish the newest `slot_count` entries of `current` (oldest first).
#[instrument(skip(current, stamp), fields(artifacts = current.len()))]
pub fn publish(
    current: &[RenderedArtifact],
    dest_dir: &Path,
    base_name: &str,
    slot_count: usize,
    stale_threshold: Duration,
    now: DateTime<Utc>,
    stamp: &StaleStamp,
) -> PublishReport {
    let mut report = PublishReport::default();
    if current.is_empty() {
        info!("Nothing to publish");
        return report;
    }

    let newest_first = current.iter().rev().take(slot_count);
    for (slot, artifact) in newest_first.enumerate() {
        let dest = slot_path(dest_dir, base_name, slot);
        let stale = age(&artifact.timestamp, &now) > stale_threshold;

        let result = if stale {
            stamp_atomic(stamp, &artifact.path, &dest, now)
        } else {
            copy_atomic(&artifact.path, &dest).map_err(|e| e.to_string())
        };
        match result {
            Ok(()) if stale => report.stamped += 1,
            Ok(()) => report.copied += 1,
            Err(e) => {
                report.failed += 1;
                warn!(src = %artifact.path.display(), dest = %dest.display(), error = %e, "Publish failed");
                continue;
            }
        }
        debug!(slot, artifact = %artifact.name, stale, "Published slot");

        if slot == 0 {
            let latest = latest_path(dest_dir, base_name);
            match copy_atomic(&dest, &latest) {
                Ok(()) => report.latest = Some(latest),
                Err(e) => {
                    report.failed += 1;
                    warn!(dest = %latest.display(), error = %e, "Could not update latest frame");
                }
            }
        }
    }

    report.unassigned_slots = slot_count.saturating_sub(current.len());
    if report.unassigned_slots > 0 {
        info!(
            unassigned = report.unassigned_slots,
            first_unassigned = current.len(),
            "Fewer frames than slots; remaining slots keep older content"
        );
    }
    report
}

fn stamp_atomic(stamp: &StaleStamp, src: &Path, dest: &Path, now: DateTime<Utc>) -> Result<(), String> {
    let tmp = partial_path(dest);
    stamp.stamp_file(src, &tmp, now).map_err(|e| e.to_string())?;
    rename_or_clean(&tmp, dest).map_err(|e| e.to_string())
}
