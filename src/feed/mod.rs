mod bulk;
mod detail;
mod notice;
mod stream;

pub use bulk::BulkSource;
pub use detail::{parse_detail_page, NoticeDetail};
pub use notice::parse_notice_xml;
pub use stream::{extract_reg_number, parse_feed, resolve_link, FeedEntry, StreamSource};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::{SubscriberFilter, TenderRecord};

const USER_AGENT_STRING: &str = "tender-alert/1.0";

/// Base of the public notice page; the registration number goes last.
pub const NOTICE_URL_PREFIX: &str =
    "https://zakupki.gov.ru/epz/order/notice/ea20/view/common-info.html?regNumber=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network error or timeout.
    Transport,
    /// Upstream answered with a non-success status.
    Status,
    /// The payload arrived but a record could not be extracted from it.
    Malformed,
    /// Local cache could not be read or written.
    Cache,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Transport => "transport",
            FailureKind::Status => "status",
            FailureKind::Malformed => "malformed",
            FailureKind::Cache => "cache",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub detail: String,
}

/// Candidates produced by one fetch, plus everything that was skipped on
/// the way. An empty `records` with no failures means upstream had nothing.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub records: Vec<TenderRecord>,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    pub fn fail(&mut self, kind: FailureKind, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!(%kind, "{}", detail);
        self.failures.push(FetchFailure { kind, detail });
    }

    pub fn upstream_broken(&self) -> bool {
        self.records.is_empty()
            && self
                .failures
                .iter()
                .any(|f| matches!(f.kind, FailureKind::Transport | FailureKind::Status))
    }
}

/// Something that yields candidate tenders once per cycle. Implementations
/// never fail as a whole; per-item problems land in [`FetchReport::failures`].
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// `filters` are the currently active subscriber filters. Sources may use
    /// them as a cheap pre-filter; matching proper happens downstream.
    async fn fetch_candidates(&self, filters: &[SubscriberFilter]) -> FetchReport;

    fn name(&self) -> &'static str;
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .user_agent(USER_AGENT_STRING)
        .build()?;
    Ok(client)
}

pub(crate) fn classify_http_error(err: &reqwest::Error) -> FailureKind {
    if err.is_status() {
        FailureKind::Status
    } else if err.is_decode() {
        FailureKind::Malformed
    } else {
        FailureKind::Transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_mean_upstream_is_broken() {
        let mut report = FetchReport::default();
        report.fail(FailureKind::Malformed, "entry without regNumber");
        assert!(!report.upstream_broken());

        report.fail(FailureKind::Cache, "disk full");
        assert!(!report.upstream_broken());

        report.fail(FailureKind::Transport, "connection reset");
        assert!(report.upstream_broken());
    }
}
