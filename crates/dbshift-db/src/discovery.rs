use std::path::Path;

use dbshift_common::Result;
use tracing::debug;

/// List unit identifiers in `dir`: the stem of every regular file, sorted
/// ascending. Migration identifiers carry a 14-digit timestamp prefix, so
/// this is also creation order.
///
/// A missing directory holds no units. Dot-files and subdirectories are
/// skipped. Files sharing a stem (`users.sql` next to an editor's
/// `users.sql~`) yield the identifier once.
pub fn discover(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        debug!("unit directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut identifiers = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            debug!("skipping non-UTF-8 file name {}", path.display());
            continue;
        };
        if stem.starts_with('.') || stem.is_empty() {
            continue;
        }
        identifiers.push(stem.to_string());
    }

    identifiers.sort();
    identifiers.dedup();
    Ok(identifiers)
}
