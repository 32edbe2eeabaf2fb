//! Removed-file check: no remaining file may reference a deleted file.

use crate::discovery::display_rel;
use crate::scan::TreeScan;
use crate::types::Issue;
use std::path::{Path, PathBuf};

/// Report every surviving file that still includes or shows a deleted file.
pub fn check_deleted_files(scan: &TreeScan, deleted: &[PathBuf], root: &Path) -> Vec<Issue> {
    let mut issues = Vec::new();
    for gone in deleted {
        for includer in scan.includers(gone) {
            if deleted.contains(includer) {
                continue;
            }
            issues.push(Issue::error(
                display_rel(includer, root),
                0,
                format!("References removed file {}", display_rel(gone, root)),
            ));
        }
    }
    issues
}
