//! Age-based retention of raw and rendered artifacts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use loop_common::{age, duration_from_hours, FileAge, TimestampFormat};
use metrics::{counter, gauge};
use tracing::{debug, info, warn};

use crate::error::PipelineResult;
use crate::product::Artifact;

/// Files are kept while `age <= max_age_hours + fudge_hours`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionWindow {
    pub max_age_hours: f64,
    pub fudge_hours: f64,
}

impl RetentionWindow {
    pub fn new(max_age_hours: f64, fudge_hours: f64) -> Self {
        Self {
            max_age_hours,
            fudge_hours,
        }
    }

    pub fn limit(&self) -> Duration {
        duration_from_hours(self.max_age_hours + self.fudge_hours)
    }
}

impl Default for RetentionWindow {
    fn default() -> Self {
        Self::new(24.0, 1.0)
    }
}

/// A directory split by age.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// Within the window, oldest first
    pub current: Vec<Artifact>,
    pub expired: Vec<Artifact>,
    /// Names without a parseable timestamp; never purged
    pub unparseable: Vec<PathBuf>,
}

/// Classify every file in `dir` ending with `suffix`. Reads the directory
/// listing only. A missing directory is empty.
pub fn partition(
    dir: &Path,
    format: &TimestampFormat,
    suffix: &str,
    now: DateTime<Utc>,
    window: RetentionWindow,
) -> PipelineResult<Partition> {
    let mut result = Partition::default();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(result),
        Err(e) => return Err(e.into()),
    };

    let limit = window.limit();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(suffix) || name.ends_with(".partial") {
            continue;
        }
        let path = entry.path();

        match format.parse(&name) {
            Err(_) => {
                warn!(file = %path.display(), pattern = format.pattern(), "Undatable file name; keeping it");
                result.unparseable.push(path);
            }
            Ok(timestamp) => {
                let expired = FileAge::Known(age(&timestamp, &now)).exceeds(limit);
                let artifact = Artifact {
                    name,
                    timestamp,
                    path,
                };
                if expired {
                    result.expired.push(artifact);
                } else {
                    result.current.push(artifact);
                }
            }
        }
    }

    result
        .current
        .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.name.cmp(&b.name)));
    result.unparseable.sort();
    gauge!("sky_looper_unparseable_files", "dir" => dir.display().to_string())
        .set(result.unparseable.len() as f64);
    debug!(
        dir = %dir.display(),
        current = result.current.len(),
        expired = result.expired.len(),
        unparseable = result.unparseable.len(),
        "Partitioned directory"
    );
    Ok(result)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub removed: usize,
    pub failed: usize,
}

/// Delete every expired artifact, continuing past failures.
pub fn purge(expired: &[Artifact]) -> PurgeStats {
    let mut stats = PurgeStats::default();
    for artifact in expired {
        match std::fs::remove_file(&artifact.path) {
            Ok(()) => {
                stats.removed += 1;
                debug!(file = %artifact.path.display(), "Purged");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                stats.removed += 1;
            }
            Err(e) => {
                stats.failed += 1;
                warn!(file = %artifact.path.display(), error = %e, "Could not delete expired file");
            }
        }
    }
    if stats.removed > 0 || stats.failed > 0 {
        counter!("sky_looper_purged_files_total").increment(stats.removed as u64);
        info!(removed = stats.removed, failed = stats.failed, "Purged expired files");
    }
    stats
}
