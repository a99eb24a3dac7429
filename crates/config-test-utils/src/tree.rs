//! Plain file tree fixtures.

use std::fs;
use std::path::Path;

/// Write `files` (relative path, content) below `root`, creating directories.
///
/// # Panics
/// Panics if any filesystem operation fails.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("write_tree: failed to create {}: {e}", parent.display())
            });
        }
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("write_tree: failed to write {}: {e}", path.display()));
    }
}
