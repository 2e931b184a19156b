//! Filesystem bundle directories: one per completed
//! job, named by a fresh bundle id, containing at least `index.html`.
//! Created exclusively so two jobs never race on the same directory.

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Writes `html` to `<bundle_root>/<bundle_id>/index.html`, creating the
/// directory. `bundle_id` is freshly generated by the caller, so the
/// directory create is exclusive by construction rather than by an
/// explicit `create_new` flag on the directory itself.
pub async fn write_bundle(bundle_root: &Path, bundle_id: Uuid, html: &str) -> io::Result<PathBuf> {
    let dir = bundle_root.join(bundle_id.to_string());
    tokio::fs::create_dir_all(&dir).await?;
    let index = dir.join("index.html");
    tokio::fs::write(&index, html).await?;
    Ok(dir)
}
