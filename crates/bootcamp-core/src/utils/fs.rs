//! File helpers shared by the store and the cache.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TMP: AtomicU64 = AtomicU64::new(0);

/// `<pid>-<n>`: never handed out twice, in this process or another.
pub(crate) fn unique_suffix() -> String {
    let id = NEXT_TMP.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", std::process::id(), id)
}

/// Hidden sibling of `path` that no other writer will pick.
pub(crate) fn unique_sibling(path: &Path, extension: &str) -> PathBuf {
    let stem = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.{}", stem, unique_suffix(), extension))
}

/// Write `contents` to a private temporary file and rename it over `path`.
///
/// Readers see either the old file or the new one. Concurrent writers to the
/// same path each rename their own file, so the last rename wins.
pub(crate) async fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    let tmp = unique_sibling(path, "tmp");
    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
