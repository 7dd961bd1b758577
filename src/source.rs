//! Load sources - local files, URLs, pasted links, query strings, demo candidates
//!
//! Every source ends up as raw log text handed to `Viewer::load_text`.
//! Gzipped logs (`.gz` suffix or gzip magic bytes) are inflated here.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;

use crate::dataset::IngestError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Pasted text that should be treated as a log location
static CSV_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.csv(\.gz)?(\?|$)").expect("CSV link pattern compiles"));

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Http { url: String, status: u16 },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{0} is not UTF-8 text")]
    Decode(String),
    #[error("log not usable: {0}")]
    Ingest(#[from] IngestError),
    #[error("no demo log found; tried {}", .tried.join(", "))]
    NoDemoFound { tried: Vec<String> },
}

/// Where a log comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    File(PathBuf),
    Url(String),
}

impl SourceRef {
    /// `http://` and `https://` prefixes mean a URL, anything else a path
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let lower = text.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceRef::Url(text.to_string())
        } else {
            SourceRef::File(PathBuf::from(text))
        }
    }

    fn name(&self) -> String {
        match self {
            SourceRef::File(p) => p.display().to_string(),
            SourceRef::Url(u) => u.clone(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Read a source to text
pub async fn fetch_text(source: &SourceRef) -> Result<String, LoadError> {
    tracing::info!("Loading log from {}", source);
    let bytes = match source {
        SourceRef::File(path) => tokio::fs::read(path).await.map_err(|e| LoadError::Io {
            path: path.clone(),
            source: e,
        })?,
        SourceRef::Url(url) => fetch_url(url).await?,
    };
    tracing::debug!("Read {} bytes from {}", bytes.len(), source);
    decode(&bytes, &source.name())
}

async fn fetch_url(url: &str) -> Result<Vec<u8>, LoadError> {
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .header("User-Agent", "SortEvoViz/0.1")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(LoadError::Http { url: url.to_string(), status: response.status().as_u16() });
    }
    Ok(response.bytes().await?.to_vec())
}

fn decode(bytes: &[u8], name: &str) -> Result<String, LoadError> {
    if name.to_ascii_lowercase().ends_with(".gz") || bytes.starts_with(&GZIP_MAGIC) {
        let mut text = String::new();
        flate2::read::GzDecoder::new(bytes)
            .read_to_string(&mut text)
            .map_err(|_| LoadError::Decode(name.to_string()))?;
        return Ok(text);
    }
    String::from_utf8(bytes.to_vec()).map_err(|_| LoadError::Decode(name.to_string()))
}

/// Try each candidate in order; the first readable one wins.
/// URL candidates get a `t=<millis>` parameter so caches are bypassed.
pub async fn fetch_first(candidates: &[String]) -> Result<(SourceRef, String), LoadError> {
    for candidate in candidates {
        let source = SourceRef::parse(candidate);
        let attempt = match &source {
            SourceRef::Url(url) => SourceRef::Url(with_cache_buster(url)),
            SourceRef::File(_) => source.clone(),
        };
        match fetch_text(&attempt).await {
            Ok(text) => {
                tracing::info!("Demo log found at {}", source);
                return Ok((source, text));
            }
            Err(e) => tracing::debug!("Demo candidate {} unavailable: {}", candidate, e),
        }
    }
    tracing::warn!("No demo log among {} candidates", candidates.len());
    Err(LoadError::NoDemoFound { tried: candidates.to_vec() })
}

fn with_cache_buster(url: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", url, sep, chrono::Utc::now().timestamp_millis())
}

/// Pasted text naming a `.csv` / `.csv.gz` log, if it looks like one
pub fn pasted_source(text: &str) -> Option<SourceRef> {
    let text = text.trim();
    if !CSV_LINK.is_match(text) || text.contains(char::is_whitespace) {
        return None;
    }
    Some(SourceRef::parse(text))
}

/// `csv=<percent-encoded source>` from a query string
pub fn source_from_query(query: &str) -> Option<SourceRef> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "csv")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .filter(|value| !value.trim().is_empty())
        .map(|value| SourceRef::parse(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_parse_source() {
        assert_eq!(SourceRef::parse(" https://x.org/a.csv "), SourceRef::Url("https://x.org/a.csv".into()));
        assert_eq!(SourceRef::parse("data/logs/run.csv"), SourceRef::File(PathBuf::from("data/logs/run.csv")));
    }

    #[test]
    fn test_pasted_source() {
        assert_eq!(pasted_source("https://x.org/run.CSV"), Some(SourceRef::Url("https://x.org/run.CSV".into())));
        assert_eq!(pasted_source("https://x.org/run.csv?raw=1"), Some(SourceRef::Url("https://x.org/run.csv?raw=1".into())));
        assert!(pasted_source("logs/run.csv.gz").is_some());
        assert!(pasted_source("https://x.org/run.csv.bak").is_none());
        assert!(pasted_source("step,algo\n0,QS.csv").is_none());
        assert!(pasted_source("").is_none());
    }

    #[test]
    fn test_query_source() {
        assert_eq!(
            source_from_query("?mode=x&csv=https%3A%2F%2Fx.org%2Frun.csv"),
            Some(SourceRef::Url("https://x.org/run.csv".into()))
        );
        assert_eq!(source_from_query("csv=logs%2Frun.csv"), Some(SourceRef::File("logs/run.csv".into())));
        assert_eq!(source_from_query("csv="), None);
        assert_eq!(source_from_query("other=1"), None);
    }

    #[test]
    fn test_decode_gzip() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"step,algo\n0,QS").unwrap();
        let bytes = enc.finish().unwrap();
        assert_eq!(decode(&bytes, "log.bin").unwrap(), "step,algo\n0,QS");
        assert_eq!(decode(b"plain", "log.csv").unwrap(), "plain");
        assert!(matches!(decode(&[0xff, 0xfe, 0x00], "log.csv"), Err(LoadError::Decode(_))));
    }

    #[test]
    fn test_cache_buster() {
        assert!(with_cache_buster("http://h/a.csv").starts_with("http://h/a.csv?t="));
        assert!(with_cache_buster("http://h/a.csv?x=1").starts_with("http://h/a.csv?x=1&t="));
    }

    #[tokio::test]
    async fn test_fetch_first_file() {
        let dir = std::env::temp_dir().join(format!("sort_evo_viz_src_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let present = dir.join("present.csv");
        std::fs::write(&present, "run_id,step,algo,opt,fitness_ms\nr,0,QS,GA,1.0").unwrap();

        let candidates = vec![
            dir.join("missing.csv").display().to_string(),
            present.display().to_string(),
        ];
        let (source, text) = fetch_first(&candidates).await.unwrap();
        assert_eq!(source, SourceRef::File(present.clone()));
        assert!(text.starts_with("run_id"));

        let err = fetch_first(&candidates[..1]).await.unwrap_err();
        assert!(matches!(err, LoadError::NoDemoFound { ref tried } if tried.len() == 1));
        std::fs::remove_dir_all(&dir).ok();
    }
}
