//! Publication handoff to the version-control collaborator.
//!
//! The pipeline's durable output is the artifact set on disk; pushing it to
//! the remote record is delegated to `git` itself. A handoff failure is a
//! warning, not a run failure: the artifacts stay valid locally and the
//! next run's change detector treats them as current.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::process::Command;

/// What the handoff actually did.
#[derive(Debug, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// Working tree was clean; nothing to commit.
    Clean,
    /// Artifacts staged, committed, and pushed.
    Pushed,
}

/// Stages all changes in `repo_dir`, commits with a timestamped message,
/// and pushes. A clean tree short-circuits to [`HandoffOutcome::Clean`].
pub async fn commit_and_push(repo_dir: &Path) -> Result<HandoffOutcome> {
    let status = git(repo_dir, &["status", "--porcelain"]).await?;
    if status.trim().is_empty() {
        tracing::info!("Working tree clean, skipping publication handoff");
        return Ok(HandoffOutcome::Clean);
    }

    git(repo_dir, &["add", "-A"]).await?;
    tracing::info!("Artifacts staged");

    let message = format!("Auto-sync EPG data {}", Utc::now().to_rfc3339());
    git(repo_dir, &["commit", "-m", &message]).await?;
    tracing::info!(message = %message, "Changes committed");

    git(repo_dir, &["push"]).await?;
    tracing::info!("Changes pushed to remote");

    Ok(HandoffOutcome::Pushed)
}

async fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn init_repo(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        for args in [
            vec!["init"],
            vec!["config", "user.email", "sync@example.com"],
            vec!["config", "user.name", "sync"],
        ] {
            git(&dir, &args).await.unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_clean_tree_skips_handoff() {
        let dir = init_repo("epg_sync_vcs_test_clean").await;

        let outcome = commit_and_push(&dir).await.unwrap();
        assert_eq!(outcome, HandoffOutcome::Clean);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_dirty_tree_commits_with_timestamped_message() {
        let dir = init_repo("epg_sync_vcs_test_dirty").await;
        std::fs::write(dir.join("epg.xml"), "<tv/>").unwrap();

        // No remote configured: the push fails, but the commit must land first
        let result = commit_and_push(&dir).await;
        assert!(result.is_err());

        let log = git(&dir, &["log", "--oneline"]).await.unwrap();
        assert!(log.contains("Auto-sync EPG data"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_repo_reports_error() {
        let dir = std::env::temp_dir().join("epg_sync_vcs_test_norepo");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();

        let result = commit_and_push(&dir).await;
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
