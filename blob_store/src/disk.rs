use std::sync::Arc;

use anyhow::{Context, Result};
use object_store::{local::LocalFileSystem, ObjectStore};

/// Bucket name assumed when running against the local filesystem.
pub const DEFAULT_BUCKET: &str = "blobs";

/// Local-filesystem backend for development and tests; each bucket is a
/// subdirectory under the configured root.
pub(crate) fn build_store(root: &str, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    let path = std::path::Path::new(root).join(bucket);
    std::fs::create_dir_all(&path)
        .with_context(|| format!("unable to create blob directory {}", path.display()))?;
    let store = LocalFileSystem::new_with_prefix(&path)
        .with_context(|| format!("unable to open blob directory {}", path.display()))?;
    Ok(Arc::new(store))
}
