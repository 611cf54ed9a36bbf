//! Write-then-rename helpers so readers never observe a half-written file.

use std::path::{Path, PathBuf};

/// Sibling path used while `path` is being written.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".partial");
    PathBuf::from(tmp)
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = partial_path(path);
    std::fs::write(&tmp, bytes)?;
    rename_or_clean(&tmp, path)
}

pub fn copy_atomic(src: &Path, dest: &Path) -> std::io::Result<()> {
    let tmp = partial_path(dest);
    std::fs::copy(src, &tmp)?;
    rename_or_clean(&tmp, dest)
}

pub(crate) fn rename_or_clean(tmp: &Path, dest: &Path) -> std::io::Result<()> {
    if let Err(e) = std::fs::rename(tmp, dest) {
        let _ = std::fs::remove_file(tmp);
        return Err(e);
    }
    Ok(())
}
