use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use zip::ZipArchive;

use crate::config::BulkConfig;
use crate::error::Result;
use crate::models::{SubscriberFilter, TenderRecord};

use super::notice::parse_notice_xml;
use super::{build_client, classify_http_error, FailureKind, FeedSource, FetchFailure, FetchReport};

const DEFAULT_ARCHIVE_NAME: &str = "notifications.zip";

/// Reads tenders from a zip archive of per-notice XML documents. The
/// archive is downloaded into the cache dir and reused until it is older
/// than `max_age`. Each cycle extracts at most `max_candidates` documents,
/// resuming where the previous cycle stopped.
pub struct BulkSource {
    client: Client,
    archive_url: String,
    username: Option<String>,
    password: Option<String>,
    cache_dir: PathBuf,
    header_scan_bytes: usize,
    max_candidates: usize,
    max_age: Duration,
    cursor: AtomicUsize,
}

#[derive(Debug, Default)]
struct ScanOutcome {
    records: Vec<TenderRecord>,
    failures: Vec<FetchFailure>,
    next_cursor: usize,
}

impl BulkSource {
    pub fn new(config: &BulkConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            archive_url: config.archive_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            cache_dir: PathBuf::from(&config.cache_dir),
            header_scan_bytes: config.header_scan_bytes.max(1),
            max_candidates: config.max_candidates.max(1),
            max_age: Duration::from_secs(config.archive_max_age_minutes.saturating_mul(60)),
            cursor: AtomicUsize::new(0),
        })
    }

    /// Where the cached archive lives: the last segment of the archive URL
    /// inside the cache dir.
    pub fn archive_path(&self) -> PathBuf {
        let name = url::Url::parse(&self.archive_url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());
        self.cache_dir.join(name)
    }

    async fn is_fresh(&self, path: &Path) -> bool {
        match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified
                .elapsed()
                .map(|age| age < self.max_age)
                .unwrap_or(true),
            Err(_) => false,
        }
    }

    /// Path of a usable archive, downloading it when missing or stale. A
    /// failed refresh falls back to the stale copy.
    async fn ensure_archive(&self, report: &mut FetchReport) -> Option<PathBuf> {
        let path = self.archive_path();
        if self.is_fresh(&path).await {
            return Some(path);
        }

        match self.download(&path).await {
            Ok(()) => {
                self.cursor.store(0, Ordering::Relaxed);
                Some(path)
            }
            Err(failure) => {
                report.fail(failure.kind, failure.detail);
                if path.exists() {
                    tracing::warn!("Using stale archive {}", path.display());
                    Some(path)
                } else {
                    None
                }
            }
        }
    }

    async fn download(&self, path: &Path) -> std::result::Result<(), FetchFailure> {
        tracing::info!("Downloading archive {}", self.archive_url);
        let mut request = self.client.get(&self.archive_url);
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request.send().await.map_err(|e| FetchFailure {
            kind: classify_http_error(&e),
            detail: format!("GET {}: {e}", self.archive_url),
        })?;
        if !response.status().is_success() {
            return Err(FetchFailure {
                kind: FailureKind::Status,
                detail: format!("GET {}: HTTP {}", self.archive_url, response.status()),
            });
        }
        let bytes = response.bytes().await.map_err(|e| FetchFailure {
            kind: classify_http_error(&e),
            detail: format!("reading {}: {e}", self.archive_url),
        })?;

        write_atomically(path, &bytes).await.map_err(|e| FetchFailure {
            kind: FailureKind::Cache,
            detail: format!("caching archive at {}: {e}", path.display()),
        })
    }
}

#[async_trait]
impl FeedSource for BulkSource {
    async fn fetch_candidates(&self, filters: &[SubscriberFilter]) -> FetchReport {
        let mut report = FetchReport::default();

        let terms = prefilter_terms(filters);
        if terms.is_empty() {
            tracing::debug!("No active filters, skipping archive scan");
            return report;
        }

        let Some(path) = self.ensure_archive(&mut report).await else {
            return report;
        };

        let start = self.cursor.load(Ordering::Relaxed);
        let scan_bytes = self.header_scan_bytes;
        let max = self.max_candidates;
        let scan_path = path.clone();
        let scanned = tokio::task::spawn_blocking(move || {
            scan_archive(&scan_path, &terms, scan_bytes, max, start)
        })
        .await;

        match scanned {
            Ok(Ok(outcome)) => {
                self.cursor.store(outcome.next_cursor, Ordering::Relaxed);
                report.records = outcome.records;
                for failure in outcome.failures {
                    report.fail(failure.kind, failure.detail);
                }
            }
            Ok(Err(e)) => {
                // A corrupt cache would otherwise be reused forever
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    tracing::debug!("Failed to remove {}: {}", path.display(), rm);
                }
                report.fail(FailureKind::Malformed, format!("archive {}: {e}", path.display()));
            }
            Err(e) => report.fail(FailureKind::Malformed, format!("archive scan aborted: {e}")),
        }

        report
    }

    fn name(&self) -> &'static str {
        "bulk"
    }
}

/// Lowercased keywords of every active filter, deduplicated.
fn prefilter_terms(filters: &[SubscriberFilter]) -> Vec<String> {
    let mut terms: Vec<String> = filters
        .iter()
        .filter(|f| f.is_active())
        .flat_map(|f| f.keywords.iter().map(|k| k.to_lowercase()))
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn header_matches(head: &[u8], terms: &[String]) -> bool {
    let head = String::from_utf8_lossy(head).to_lowercase();
    terms.iter().any(|term| head.contains(term.as_str()))
}

fn scan_archive(
    path: &Path,
    terms: &[String],
    scan_bytes: usize,
    max_candidates: usize,
    start: usize,
) -> Result<ScanOutcome> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let total = archive.len();
    let mut outcome = ScanOutcome::default();
    if total == 0 {
        return Ok(outcome);
    }

    let start = start % total;
    outcome.next_cursor = start;
    for step in 0..total {
        let idx = (start + step) % total;
        outcome.next_cursor = (idx + 1) % total;

        let mut entry = match archive.by_index(idx) {
            Ok(entry) => entry,
            Err(e) => {
                outcome.failures.push(FetchFailure {
                    kind: FailureKind::Malformed,
                    detail: format!("archive entry #{idx}: {e}"),
                });
                continue;
            }
        };
        if !entry.is_file() || !entry.name().to_lowercase().ends_with(".xml") {
            continue;
        }
        let name = entry.name().to_string();

        // Cheap look at the head of the document before extracting it whole
        let mut doc = Vec::with_capacity(scan_bytes);
        if let Err(e) = entry.by_ref().take(scan_bytes as u64).read_to_end(&mut doc) {
            outcome.failures.push(FetchFailure {
                kind: FailureKind::Malformed,
                detail: format!("{name}: {e}"),
            });
            continue;
        }
        if !header_matches(&doc, terms) {
            continue;
        }
        if let Err(e) = entry.read_to_end(&mut doc) {
            outcome.failures.push(FetchFailure {
                kind: FailureKind::Malformed,
                detail: format!("{name}: {e}"),
            });
            continue;
        }

        match parse_notice_xml(&String::from_utf8_lossy(&doc)) {
            Ok(record) => outcome.records.push(record),
            Err(e) => outcome.failures.push(FetchFailure {
                kind: FailureKind::Malformed,
                detail: format!("{name}: {e}"),
            }),
        }

        if outcome.records.len() >= max_candidates {
            break;
        }
    }

    Ok(outcome)
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = path.with_extension("part");
    tokio::fs::write(&partial, bytes).await?;
    tokio::fs::rename(&partial, path).await
}
