use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use futures::StreamExt;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 50 * 1024 * 1024; // 50MB

/// Some guide hosts reject unknown clients; the upstream mirrors expect a
/// browser-like agent.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Transport encoding of a source. `.gz` sources serve a gzip file as the
/// body; plain sources serve markup directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Gzip,
}

/// Priority tier of a source. Primary sources are tried, in order, before
/// any backup source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Backup,
}

/// A ranked feed endpoint. Sources form a priority list, not a set: order
/// is preserved and duplicates are allowed.
#[derive(Debug, Clone)]
pub struct Source {
    pub url: String,
    pub encoding: Encoding,
    pub tier: Tier,
}

impl Source {
    pub fn new(url: impl Into<String>, tier: Tier) -> Self {
        let url = url.into();
        let encoding = if url.ends_with(".gz") {
            Encoding::Gzip
        } else {
            Encoding::Plain
        };
        Self { url, encoding, tier }
    }
}

/// An accepted raw feed, tagged with its originating source for diagnostics.
/// The body is never mutated in place; repair produces a new buffer.
#[derive(Debug)]
pub struct RawFeed {
    pub body: String,
    pub source: String,
}

/// Per-source retry budget and backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts beyond the first, per source.
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each failed attempt.
    pub base_delay: Duration,
    /// Wall-clock limit for a single request.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Errors that can occur while acquiring a raw feed.
///
/// Everything except [`FetchError::AllSourcesExhausted`] describes a single
/// failed attempt; attempts are retried up to the configured budget and then
/// escalate to the next source, so only exhaustion is terminal for a run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Body was empty or whitespace-only
    #[error("Empty response body")]
    EmptyBody,
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// A `.gz` source served bytes that would not decompress
    #[error("Gzip decode failed: {0}")]
    GzipDecode(String),
    /// Every source failed after its retry budget
    #[error("All {0} sources exhausted")]
    AllSourcesExhausted(usize),
}

/// Acquires a raw feed from the first source that yields a non-empty body.
///
/// Sources are tried strictly in priority order; each gets its full retry
/// budget before the next is attempted. Content is not validated as XML
/// here; a truncated document is still an acceptable body, repair and
/// parse decide what to make of it.
pub async fn acquire(
    client: &reqwest::Client,
    sources: &[Source],
    retry: &RetryPolicy,
) -> Result<RawFeed, FetchError> {
    for (rank, source) in sources.iter().enumerate() {
        tracing::info!(
            source = %source.url,
            tier = ?source.tier,
            rank = rank + 1,
            total = sources.len(),
            "Trying source"
        );

        match fetch_source(client, source, retry).await {
            Ok(body) => {
                tracing::info!(source = %source.url, bytes = body.len(), "Source accepted");
                return Ok(RawFeed {
                    body,
                    source: source.url.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(source = %source.url, error = %e, "Source failed, advancing to next");
            }
        }
    }

    Err(FetchError::AllSourcesExhausted(sources.len()))
}

/// Fetches one source with its retry budget. Any attempt failure (status,
/// transport, timeout, empty body) is retried with doubling backoff.
async fn fetch_source(
    client: &reqwest::Client,
    source: &Source,
    retry: &RetryPolicy,
) -> Result<String, FetchError> {
    let mut delay = retry.base_delay;
    let mut attempt: u32 = 0;

    loop {
        match fetch_once(client, source, retry.timeout).await {
            Ok(body) => {
                tracing::info!(
                    source = %source.url,
                    attempt = attempt + 1,
                    bytes = body.len(),
                    "Fetch attempt succeeded"
                );
                return Ok(body);
            }
            Err(e) => {
                tracing::warn!(
                    source = %source.url,
                    attempt = attempt + 1,
                    error = %e,
                    "Fetch attempt failed"
                );
                if attempt >= retry.max_retries {
                    return Err(e);
                }
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

async fn fetch_once(
    client: &reqwest::Client,
    source: &Source,
    timeout: Duration,
) -> Result<String, FetchError> {
    let response = tokio::time::timeout(timeout, client.get(&source.url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    let body = decode_body(&bytes, source.encoding)?;

    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody);
    }

    Ok(body)
}

fn decode_body(bytes: &[u8], encoding: Encoding) -> Result<String, FetchError> {
    match encoding {
        Encoding::Plain => Ok(String::from_utf8_lossy(bytes).into_owned()),
        Encoding::Gzip => {
            // The transport layer (Content-Encoding) may already have
            // decompressed the payload; only decode an actual gzip stream.
            if !bytes.starts_with(&[0x1f, 0x8b]) {
                return Ok(String::from_utf8_lossy(bytes).into_owned());
            }
            let mut decoder = GzDecoder::new(bytes);
            let mut body = String::new();
            decoder
                .read_to_string(&mut body)
                .map_err(|e| FetchError::GzipDecode(e.to_string()))?;
            Ok(body)
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // An interrupted transfer can deliver fewer bytes than Content-Length
    // promised; surface it as a retryable failure rather than handing a
    // silently shortened body to repair.
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
