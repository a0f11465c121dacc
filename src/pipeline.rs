//! Run-to-completion orchestration.
//!
//! One run is strictly sequential: acquire → change gate → repair → parse →
//! publish → handoff. The change gate reads the previous digest once at the
//! start and runs before repair/parse, so an unchanged feed (even a still
//! broken one) skips the whole downstream. Overlap between runs is an
//! external scheduling invariant, not something enforced here.

use std::path::Path;

use thiserror::Error;

use crate::config::Config;
use crate::feed::{self, FetchError, ParseError};
use crate::{digest, publish, vcs};

/// How a successful run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Feed is byte-identical to the last published one; nothing written.
    Unchanged,
    /// New artifact set published. A failed handoff does not demote this;
    /// the artifacts are valid locally regardless.
    Published,
}

/// Terminal failures. Each aborts the run with no partial publish.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Feed acquisition failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Feed could not be normalized: {0}")]
    Parse(#[from] ParseError),

    #[error("Artifact publication failed: {0}")]
    Publish(#[source] anyhow::Error),
}

/// Executes one sync run.
pub async fn run(config: &Config, client: &reqwest::Client) -> Result<Outcome, PipelineError> {
    let sources = config.sources();
    let retry = config.fetch.retry_policy();

    let raw = feed::acquire(client, &sources, &retry).await?;

    let previous = read_previous_digest(&config.output.digest_path());
    if !digest::should_publish(&raw.body, previous.as_deref()) {
        tracing::info!(source = %raw.source, "Feed unchanged since last publish");
        return Ok(Outcome::Unchanged);
    }

    let repaired = feed::repair(&raw.body);
    let document = feed::parse(&repaired)?;
    tracing::info!(
        source = %raw.source,
        channels = document.channels.len(),
        programmes = document.programmes.len(),
        "Feed normalized"
    );

    publish::publish(&config.output, &raw.body, &document).map_err(PipelineError::Publish)?;

    if config.git.enabled {
        match vcs::commit_and_push(&config.git.dir).await {
            Ok(outcome) => tracing::info!(?outcome, "Publication handoff complete"),
            Err(e) => {
                // Artifacts are already durable; the next run will see them
                // as current. Only the remote record is behind.
                tracing::warn!(error = %e, "Publication handoff failed, artifacts remain local");
            }
        }
    }

    Ok(Outcome::Published)
}

/// The previous run's digest, if any. An unreadable digest file is logged
/// and treated as "no previous publish" so the feed is re-published rather
/// than silently skipped.
fn read_previous_digest(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read previous digest, republishing");
            None
        }
    }
}
