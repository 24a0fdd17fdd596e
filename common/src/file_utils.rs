//! File listing helpers for frame directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Supported FITS file extensions.
pub const FITS_EXTENSIONS: &[&str] = &["fit", "fits", "fts"];

/// Returns true when `path` has one of `extensions` (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Returns paths to all files in a directory matching the given extensions,
/// sorted by file name so repeated runs visit frames in the same order.
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Returns paths to all FITS frames in the given directory.
pub fn fits_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    files_with_extensions(dir, FITS_EXTENSIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_output_path;

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(has_extension(Path::new("a/b/light_001.FITS"), FITS_EXTENSIONS));
        assert!(has_extension(Path::new("frame.fts"), FITS_EXTENSIONS));
        assert!(!has_extension(Path::new("frame.png"), FITS_EXTENSIONS));
        assert!(!has_extension(Path::new("frame"), FITS_EXTENSIONS));
    }

    #[test]
    fn fits_files_are_sorted_and_filtered() {
        let dir = test_output_path("file_utils_listing");
        fs::create_dir_all(&dir).unwrap();
        for name in ["b.fits", "a.fit", "notes.txt"] {
            fs::write(dir.join(name), b"").unwrap();
        }

        let files = fits_files(&dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.fit", "b.fits"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(fits_files(Path::new("/definitely/not/here")).is_err());
    }
}
