//! Source file discovery.

use std::io;
use std::path::{Path, PathBuf};

/// Extension of gale source files.
pub const SOURCE_EXT: &str = "g";

/// Returns the `.g` files directly inside `dir`, sorted by name.
///
/// Subdirectories are not descended into; a package is a flat directory.
pub fn source_files_in_dir(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut ret = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXT) {
            ret.push(path);
        }
    }
    ret.sort();
    Ok(ret)
}
