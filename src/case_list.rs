// 📂 Case list - image files that make up a scoring session
//
// Each image path doubles as the case identifier.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

/// Image extensions the viewer can open (lowercase, no dot)
pub const SUPPORTED_EXTENSIONS: &[&str] = &["dcm", "bmp"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Supported image files directly inside `folder`, sorted by file name
pub fn scan_folder(folder: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(folder)
        .with_context(|| format!("Failed to read folder {}", folder.display()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to list {}", folder.display()))?
            .path();
        if path.is_file() && is_supported_image(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    debug!("Found {} images in {}", paths.len(), folder.display());
    Ok(paths
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image(Path::new("/x/a.dcm")));
        assert!(is_supported_image(Path::new("/x/B.BMP")));
        assert!(!is_supported_image(Path::new("/x/a.png")));
        assert!(!is_supported_image(Path::new("/x/dcm")));
    }

    #[test]
    fn test_scan_folder_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.dcm", "a.BMP", "notes.txt", "c.dcm"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.dcm")).unwrap();

        let cases = scan_folder(dir.path()).unwrap();
        let names: Vec<_> = cases
            .iter()
            .map(|p| Path::new(p).file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.BMP", "b.dcm", "c.dcm"]);
    }

    #[test]
    fn test_scan_missing_folder_errors() {
        assert!(scan_folder(Path::new("/definitely/not/here")).is_err());
    }
}
