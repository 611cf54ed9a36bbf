//! Download remote objects not already present locally.

use std::path::Path;

use metrics::counter;
use storage::{LocalInventory, RemoteStore};
use tracing::{debug, info, warn};

use crate::planner::QueryPrefix;
use crate::product::{ProductKey, RawArtifact};

/// List every prefix and download matching objects missing from `inventory`
/// (or all matching objects when `force` is set).
///
/// Listing and download failures are logged and skipped; the next cycle
/// retries them. Returns only the artifacts downloaded by this call.
pub async fn fetch_new(
    store: &dyn RemoteStore,
    product: &ProductKey,
    prefixes: &[QueryPrefix],
    inventory: &mut LocalInventory,
    dest_dir: &Path,
    force: bool,
) -> Vec<RawArtifact> {
    let format = match product.timestamp_format() {
        Ok(f) => f,
        Err(e) => {
            warn!(product = %product.label(), error = %e, "Product has no usable timestamp format");
            return Vec::new();
        }
    };

    let mut fetched: Vec<RawArtifact> = Vec::new();
    for query in prefixes {
        let handles = match store.list_objects(&query.prefix).await {
            Ok(h) => h,
            Err(e) => {
                warn!(prefix = %query.prefix, error = %e, transient = e.is_transient(), "Listing failed; skipping prefix");
                continue;
            }
        };
        debug!(prefix = %query.prefix, objects = handles.len(), "Listed prefix");

        for handle in &handles {
            let Some(local) = product.local_name(&handle.key) else {
                continue;
            };
            if inventory.contains(&local) && !force {
                continue;
            }
            if fetched.iter().any(|a| a.name == local) {
                continue;
            }
            let timestamp = match format.parse(&local) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(key = %handle.key, error = %e, "Remote object has an undatable name; skipping");
                    continue;
                }
            };

            let dest = dest_dir.join(&local);
            match store.download(handle, &dest).await {
                Ok(bytes) => {
                    info!(key = %handle.key, local = %local, bytes, "Downloaded");
                    counter!("sky_looper_downloads_total", "product" => product.label()).increment(1);
                    inventory.insert(local.clone());
                    fetched.push(RawArtifact {
                        name: local,
                        timestamp,
                        path: dest,
                    });
                }
                Err(e) => {
                    warn!(key = %handle.key, error = %e, "Download failed; skipping object");
                }
            }
        }
    }

    fetched
}
