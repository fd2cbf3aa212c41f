use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Writes through a sibling `.tmp` file and renames it into place, so readers never see a
/// half-written export.
pub(crate) fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = staging_path(path);
    fs::write(&staging, bytes)?;
    if let Err(error) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "export".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrites_existing_file_without_leaving_staging() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("atlas.png");
        write_bytes_atomic(&path, b"first").expect("first write");
        write_bytes_atomic(&path, b"second").expect("second write");
        assert_eq!(fs::read(&path).expect("read"), b"second");
        assert!(!staging_path(&path).exists());
    }
}
