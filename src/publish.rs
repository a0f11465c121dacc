//! Atomic publication of the three-artifact set.
//!
//! One publish cycle writes the canonical markup, the pretty-printed
//! structured form, and the digest of the markup. The set is visible
//! all-or-nothing: every artifact is first staged to a temp file in the
//! destination directory, and only when all three staged writes have
//! synced are they renamed into place. A failure during staging removes
//! the temps and leaves the prior generation untouched, so the next run's
//! change detector still sees a consistent previous state.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use crate::config::OutputConfig;
use crate::digest::content_digest;
use crate::feed::FeedDocument;

/// Writes the artifact set for one accepted feed.
///
/// The markup artifact is the accepted raw feed text verbatim: its digest
/// is what gates the next run, so the two must be derived from the same
/// bytes. The structured form is serialized with stable per-record key
/// order (struct declaration order).
pub fn publish(out: &OutputConfig, markup: &str, document: &FeedDocument) -> Result<()> {
    std::fs::create_dir_all(&out.dir).with_context(|| {
        format!("Failed to create output directory '{}'", out.dir.display())
    })?;

    let structured = serde_json::to_string_pretty(document)
        .context("Failed to serialize feed document")?;
    let digest = content_digest(markup);

    let artifacts: [(PathBuf, &[u8]); 3] = [
        (out.xml_path(), markup.as_bytes()),
        (out.json_path(), structured.as_bytes()),
        (out.digest_path(), digest.as_bytes()),
    ];

    // Phase 1: stage everything. No destination is touched yet.
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(artifacts.len());
    for (dest, content) in &artifacts {
        match stage(dest, content) {
            Ok(temp) => staged.push((temp, dest.clone())),
            Err(e) => {
                for (temp, _) in &staged {
                    let _ = std::fs::remove_file(temp);
                }
                return Err(e);
            }
        }
    }

    // Phase 2: rename into place. POSIX rename is atomic per file; once the
    // first rename lands the set is committed, so a failure here only
    // cleans up temps that never made it.
    for (i, (temp, dest)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(temp, dest) {
            for (remaining, _) in &staged[i..] {
                let _ = std::fs::remove_file(remaining);
            }
            return Err(e).with_context(|| {
                format!(
                    "Failed to rename '{}' to '{}'",
                    temp.display(),
                    dest.display()
                )
            });
        }
        tracing::info!(path = %dest.display(), "Artifact written");
    }

    Ok(())
}

/// Stages content next to its destination: randomized temp name,
/// `create_new` so a leftover temp is never silently reused, synced to disk
/// before the caller renames it.
fn stage(dest: &Path, content: &[u8]) -> Result<PathBuf> {
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    // Append to the full file name rather than replacing the extension:
    // the three artifacts share a stem, and their temps must not collide.
    let temp_path = {
        let mut name = dest
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".tmp.{:016x}", random_suffix));
        dest.with_file_name(name)
    };

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    file.write_all(content).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to write to temporary file '{}': disk may be full",
            temp_path.display()
        )
    })?;

    file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk",
            temp_path.display()
        )
    })?;

    Ok(temp_path)
}
