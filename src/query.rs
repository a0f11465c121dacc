//! Filtering core for the guide query service.
//!
//! The HTTP endpoint itself is an external collaborator; it loads the
//! published structured artifact and applies these filters; it never
//! re-parses markup. Filters compose: both `channel` and `date` given means
//! both must match.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feed::{FeedDocument, Programme};

#[derive(Debug, Error)]
pub enum QueryError {
    /// The structured artifact has not been published yet.
    #[error("Structured data file not found: {0}")]
    NotFound(String),

    /// The artifact exists but could not be read.
    #[error("Failed to read structured data: {0}")]
    Io(String),

    /// The artifact is not valid structured data.
    #[error("Failed to parse structured data: {0}")]
    Data(String),
}

/// Query parameters. Both are optional; an empty query matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    /// Exact channel id to match.
    pub channel: Option<String>,
    /// Date in `YYYY-MM-DD`; matches the first 8 characters of a
    /// programme's start timestamp with the separators stripped.
    pub date: Option<String>,
}

/// Query result in the service's response shape. Unmatched filters yield
/// `count: 0, data: []`, not an error.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub query: Query,
    pub count: usize,
    pub data: Vec<Programme>,
}

/// Loads the published structured artifact.
pub fn load_document(path: &Path) -> Result<FeedDocument, QueryError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(QueryError::NotFound(path.display().to_string()))
        }
        Err(e) => return Err(QueryError::Io(e.to_string())),
    };
    serde_json::from_str(&content).map_err(|e| QueryError::Data(e.to_string()))
}

/// Applies the query's filters over the document's programmes, preserving
/// their order.
pub fn filter(document: &FeedDocument, query: &Query) -> QueryResponse {
    let date_key = query.date.as_ref().map(|d| d.replace('-', ""));

    let data: Vec<Programme> = document
        .programmes
        .iter()
        .filter(|p| {
            if let Some(channel) = &query.channel {
                if &p.channel != channel {
                    return false;
                }
            }
            if let Some(key) = &date_key {
                // Starts shorter than a full date never match
                match p.start.get(..8) {
                    Some(prefix) if prefix == key => {}
                    _ => return false,
                }
            }
            true
        })
        .cloned()
        .collect();

    QueryResponse {
        success: true,
        query: query.clone(),
        count: data.len(),
        data,
    }
}
